//! Duration parsing for command-line values

use std::time::Duration;

/// Parse duration string (e.g., "10s", "5m", "1h", "100ms").
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".to_string());
    }

    let (num_str, unit) = s
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| s.split_at(i))
        .unwrap_or((s, "s"));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    let multiplier = match unit.trim().to_lowercase().as_str() {
        "ms" => 1,
        "s" | "" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        _ => return Err(format!("Unknown duration unit: {}", unit)),
    };

    let millis = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Duration value too large: {}", s))?;
    Ok(Duration::from_millis(millis))
}

/// Format a duration with the largest unit that divides it evenly
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis() as u64;
    if millis == 0 {
        return "0s".to_string();
    }

    if millis.is_multiple_of(60 * 60 * 1000) {
        format!("{}h", millis / (60 * 60 * 1000))
    } else if millis.is_multiple_of(60 * 1000) {
        format!("{}m", millis / (60 * 1000))
    } else if millis.is_multiple_of(1000) {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ten").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("99999999999999999h").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::from_secs(10)), "10s");
        assert_eq!(format_duration(&Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(&Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(&Duration::ZERO), "0s");
    }
}
