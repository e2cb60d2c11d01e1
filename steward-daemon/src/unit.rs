//! Unit file generation for services created through the registry.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DaemonError, Result};
use crate::manager::Scope;

/// System-wide unit directory
pub const LOCATION_GLOBAL: &str = "/etc/systemd/system";
/// Per-user unit directory, relative to `$HOME`
pub const LOCATION_USER: &str = ".config/systemd/user";

/// Definition of a service to create
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub command: String,
    #[serde(rename = "work_dir", default)]
    pub working_directory: PathBuf,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Render the unit description for a service.
///
/// The working directory is expected to be absolute already.
pub fn render_unit(service: &NewService) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[Unit]");
    let _ = writeln!(out, "Description={}", service.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "[Service]");
    for (key, value) in &service.environment {
        let _ = writeln!(out, "Environment={}={}", key, value);
    }
    let _ = writeln!(out, "ExecStart={}", service.command);
    let _ = writeln!(out, "Restart=always");
    let _ = writeln!(out, "RestartSec=5");
    if !service.working_directory.as_os_str().is_empty() {
        let _ = writeln!(out, "WorkingDirectory={}", service.working_directory.display());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[Install]");
    let _ = writeln!(out, "WantedBy=multi-user.target");
    out
}

/// Directory where unit files live for the given scope
pub fn unit_dir(scope: Scope) -> Result<PathBuf> {
    match scope {
        Scope::Global => Ok(PathBuf::from(LOCATION_GLOBAL)),
        Scope::User => dirs::home_dir()
            .map(|home| home.join(LOCATION_USER))
            .ok_or_else(|| DaemonError::Internal("Could not determine home directory".into())),
    }
}

/// Reject names that are empty or would escape the unit directory
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DaemonError::InvalidServiceName(name.to_string()));
    }
    Ok(())
}

/// Path of the unit file for `name` inside `dir`
pub fn unit_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.service", name))
}

/// Resolve a working directory to an absolute, existing directory
pub fn resolve_working_dir(path: &Path) -> Result<PathBuf> {
    let resolved = std::fs::canonicalize(path).map_err(|e| DaemonError::WorkingDir {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !resolved.is_dir() {
        return Err(DaemonError::WorkingDir {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    Ok(resolved)
}

/// Write the unit file, creating the directory when needed
pub fn write_unit(dir: &Path, service: &NewService) -> Result<PathBuf> {
    let path = unit_path(dir, &service.name);
    std::fs::create_dir_all(dir).map_err(|e| DaemonError::UnitFile {
        path: dir.to_path_buf(),
        source: e,
    })?;
    std::fs::write(&path, render_unit(service)).map_err(|e| DaemonError::UnitFile {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> NewService {
        NewService {
            name: "web".into(),
            command: "/usr/bin/nc -l 9000".into(),
            working_directory: PathBuf::from("/srv/web"),
            environment: BTreeMap::from([
                ("PORT".to_string(), "9000".to_string()),
                ("MODE".to_string(), "prod".to_string()),
            ]),
        }
    }

    #[test]
    fn test_render_unit() {
        let unit = render_unit(&sample());
        let expected = "\
[Unit]
Description=web

[Service]
Environment=MODE=prod
Environment=PORT=9000
ExecStart=/usr/bin/nc -l 9000
Restart=always
RestartSec=5
WorkingDirectory=/srv/web

[Install]
WantedBy=multi-user.target
";
        assert_eq!(unit, expected);
    }

    #[test]
    fn test_render_unit_without_working_dir() {
        let service = NewService {
            working_directory: PathBuf::new(),
            ..sample()
        };
        assert!(!render_unit(&service).contains("WorkingDirectory"));
    }

    #[test]
    fn test_validate_name() {
        validate_name("web").unwrap();
        validate_name("api-v2.worker").unwrap();
        for bad in ["", "  ", ".", "..", "../x", "a/b", "/etc/passwd"] {
            assert!(
                matches!(validate_name(bad), Err(DaemonError::InvalidServiceName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_working_dir_missing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            resolve_working_dir(&missing),
            Err(DaemonError::WorkingDir { .. })
        ));
    }

    #[test]
    fn test_resolve_working_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert!(resolve_working_dir(&file).is_err());
    }

    #[test]
    fn test_write_unit_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("units");
        let path = write_unit(&dir, &sample()).unwrap();
        assert_eq!(path, dir.join("web.service"));
        assert!(std::fs::read_to_string(path).unwrap().contains("ExecStart=/usr/bin/nc"));
    }

    #[test]
    fn test_new_service_json_field_names() {
        let json = r#"{"name":"api","command":"./api","work_dir":"/srv/api"}"#;
        let service: NewService = serde_json::from_str(json).unwrap();
        assert_eq!(service.working_directory, PathBuf::from("/srv/api"));
        assert!(service.environment.is_empty());
    }
}
