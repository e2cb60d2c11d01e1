//! In-memory service manager for driving the registry without systemd

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use steward_daemon::manager::{FIELD_STATUS, Operation, STATE_DEAD, STATE_RUNNING, ServiceManager};
use steward_daemon::{DaemonError, Result};

#[derive(Default)]
struct FakeState {
    running: HashMap<String, bool>,
    failing: HashSet<(String, String)>,
    calls: Vec<String>,
    delay: Option<Duration>,
}

/// Service manager that keeps unit state in memory.
///
/// `start` and `restart` mark a unit running, `stop` marks it dead and
/// `show SubState` reports the result. Any operation can be made to fail for
/// a given unit.
#[derive(Clone, Default)]
pub struct FakeManager {
    state: Arc<Mutex<FakeState>>,
}

impl FakeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a unit's state behind the registry's back, like a crash would
    pub fn set_running(&self, name: &str, running: bool) {
        self.state.lock().running.insert(name.to_string(), running);
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state.lock().running.get(name).copied().unwrap_or(false)
    }

    /// Make `operation` (by name, e.g. "start") fail for `name`
    pub fn fail(&self, name: &str, operation: &str) {
        self.state
            .lock()
            .failing
            .insert((name.to_string(), operation.to_string()));
    }

    /// Delay every operation, to simulate a slow service manager
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Every call so far, formatted as "<operation> <name>"
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        let prefix = format!("{} ", operation);
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }
}

impl ServiceManager for FakeManager {
    async fn execute(&self, name: &str, operation: Operation) -> Result<String> {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.calls.push(format!("{} {}", operation, name));

        if state
            .failing
            .contains(&(name.to_string(), operation.as_str().to_string()))
        {
            return Err(DaemonError::Command {
                service: name.to_string(),
                operation: operation.to_string(),
                message: "exit code 1".to_string(),
            });
        }

        match operation {
            Operation::Start | Operation::Restart => {
                state.running.insert(name.to_string(), true);
                Ok(String::new())
            }
            Operation::Stop => {
                state.running.insert(name.to_string(), false);
                Ok(String::new())
            }
            Operation::Show { field } if field == FIELD_STATUS => {
                let running = state.running.get(name).copied().unwrap_or(false);
                Ok(format!("{}\n", if running { STATE_RUNNING } else { STATE_DEAD }))
            }
            Operation::Show { .. } => Ok(String::new()),
            Operation::Log { limit } => Ok(format!("last {} lines of {}", limit, name)),
            Operation::Enable | Operation::Disable | Operation::Update { .. } => Ok(String::new()),
        }
    }
}
