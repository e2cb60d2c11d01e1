//! Service manager abstraction.
//!
//! The registry never starts or stops processes itself. Every lifecycle
//! operation is delegated to a [`ServiceManager`], which for production use is
//! [`Systemctl`]: a thin command executor over `systemctl` and `journalctl`.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

mod systemd;
#[cfg(test)]
pub(crate) mod mock;

pub use systemd::Systemctl;

/// Property holding the unit's sub-state (`running`, `dead`, ...)
pub const FIELD_STATUS: &str = "SubState";
/// Property holding the unit's working directory
pub const FIELD_WORKDIR: &str = "WorkingDirectory";

/// Sub-state reported for an active service
pub const STATE_RUNNING: &str = "running";
/// Sub-state reported for an inactive service
pub const STATE_DEAD: &str = "dead";
/// Sentinel used when the service manager could not be queried
pub const STATE_UNKNOWN: &str = "unknown";

/// Maximum number of journal lines returned by [`Operation::Log`]
pub const LOG_LIMIT: usize = 1024;

/// Whether units are system-wide or belong to the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    User,
}

impl Scope {
    pub fn from_global(global: bool) -> Self {
        if global { Scope::Global } else { Scope::User }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Scope::User)
    }
}

/// Operation understood by a service manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    /// Read a single unit property
    Show { field: String },
    /// Read the last `limit` journal lines
    Log { limit: usize },
    /// Run a shell command inside the unit's working directory
    Update { command: String },
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Enable => "enable",
            Operation::Disable => "disable",
            Operation::Show { .. } => "show",
            Operation::Log { .. } => "log",
            Operation::Update { .. } => "update",
        }
    }

    pub fn show(field: &str) -> Self {
        Operation::Show {
            field: field.to_string(),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes operations against an external service manager.
///
/// Implementations must surface a non-zero exit as an error; output of a
/// failed command is never returned.
pub trait ServiceManager: Send + Sync + 'static {
    fn execute(
        &self,
        name: &str,
        operation: Operation,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Live status of one service as reported by the service manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: String,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, STATE_UNKNOWN)
    }

    pub fn is_running(&self) -> bool {
        self.status == STATE_RUNNING
    }

    /// Icon used by the chat notifier for this status
    pub fn icon(&self) -> &'static str {
        match self.status.as_str() {
            STATE_RUNNING => "\u{2699}",
            STATE_DEAD => "⚰️",
            _ => "",
        }
    }
}

/// Status of every tracked service, in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllStatuses {
    pub services: Vec<ServiceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_global() {
        assert_eq!(Scope::from_global(true), Scope::Global);
        assert_eq!(Scope::from_global(false), Scope::User);
        assert!(Scope::User.is_user());
        assert!(!Scope::Global.is_user());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Start.as_str(), "start");
        assert_eq!(Operation::show(FIELD_STATUS).as_str(), "show");
        assert_eq!(Operation::Log { limit: 10 }.to_string(), "log");
        assert_eq!(
            Operation::Update {
                command: "git pull".into()
            }
            .as_str(),
            "update"
        );
    }

    #[test]
    fn test_status_helpers() {
        assert!(ServiceStatus::new("web", "running").is_running());
        assert!(!ServiceStatus::new("web", "dead").is_running());
        assert!(!ServiceStatus::unknown("web").is_running());
        assert_eq!(ServiceStatus::unknown("web").status, "unknown");
        assert_eq!(ServiceStatus::new("web", "exited").icon(), "");
    }
}
