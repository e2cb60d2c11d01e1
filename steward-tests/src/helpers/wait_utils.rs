//! Async utilities to wait for events

use std::time::Duration;

use steward_daemon::events::{EventReceiver, EventType, SystemEvent};
use tokio::time::{Instant, timeout};

/// Error type for wait operations
#[derive(Debug)]
pub enum WaitError {
    Timeout,
    StreamClosed,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Timeout => write!(f, "Wait operation timed out"),
            WaitError::StreamClosed => write!(f, "Event stream closed"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Receive the next event, failing after `limit`
pub async fn next_event(
    events: &mut EventReceiver,
    limit: Duration,
) -> Result<SystemEvent, WaitError> {
    match timeout(limit, events.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(WaitError::StreamClosed),
        Err(_) => Err(WaitError::Timeout),
    }
}

/// Skip events until one of `event_type` for `name` arrives
pub async fn wait_for_event(
    events: &mut EventReceiver,
    event_type: EventType,
    name: &str,
    limit: Duration,
) -> Result<SystemEvent, WaitError> {
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = next_event(events, remaining).await?;
        if event.event_type == event_type && event.name == name {
            return Ok(event);
        }
    }
}

/// Collect events as (type, name) pairs until the stream stays quiet for
/// `quiet` or closes
pub async fn collect_events(
    events: &mut EventReceiver,
    quiet: Duration,
) -> Vec<(EventType, String)> {
    let mut out = Vec::new();
    while let Ok(event) = next_event(events, quiet).await {
        out.push((event.event_type, event.name));
    }
    out
}

/// Assert that nothing arrives within `quiet`
pub async fn expect_no_event(events: &mut EventReceiver, quiet: Duration) {
    if let Ok(event) = next_event(events, quiet).await {
        panic!("unexpected event: {}", event);
    }
}
