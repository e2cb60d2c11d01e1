use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{DaemonError, Result};
use crate::events::{EventReceiver, SystemEvent, event_channel};

/// Environment variable carrying the service name
pub const ENV_SERVICE: &str = "SERVICE";
/// Environment variable carrying the lower-case event type
pub const ENV_EVENT: &str = "EVENT";

/// Runs a shell command for every event, with the event in its environment
#[derive(Debug, Clone)]
pub struct HookRunner {
    command: String,
}

impl HookRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the hook to completion. Output goes to the daemon's stdout/stderr.
    pub async fn run(&self, event: &SystemEvent) -> Result<()> {
        debug!("Running hook for {}", event);
        let failed = |message: String| DaemonError::HookFailed {
            service: event.name.clone(),
            event: event.event_type.to_string(),
            message,
        };

        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(ENV_SERVICE, &event.name)
            .env(ENV_EVENT, event.event_type.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| failed(format!("failed to spawn: {}", e)))?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(failed(format!("exit code {}", code))),
            None => Err(failed("killed by signal".to_string())),
        }
    }
}

/// Run `runner` for each event, then forward the event unchanged.
///
/// Hook failures are logged and never stop the event. Hooks run one at a
/// time, so a slow hook holds back everything downstream.
pub fn with_hook(
    mut upstream: EventReceiver,
    runner: HookRunner,
    capacity: usize,
) -> EventReceiver {
    let (tx, rx) = event_channel(capacity);
    tokio::spawn(async move {
        while let Some(event) = upstream.recv().await {
            if let Err(e) = runner.run(&event).await {
                warn!("{}", e);
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }
        debug!("Hook stage closed");
    });
    rx
}
