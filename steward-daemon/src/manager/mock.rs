use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{FIELD_STATUS, Operation, STATE_DEAD, STATE_RUNNING, ServiceManager};
use crate::errors::{DaemonError, Result};

#[derive(Default)]
struct MockState {
    running: HashMap<String, bool>,
    failing: HashSet<(String, &'static str)>,
    calls: Vec<String>,
}

/// In-memory service manager recording every call
#[derive(Clone, Default)]
pub(crate) struct MockManager {
    state: Arc<Mutex<MockState>>,
}

impl MockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, name: &str, running: bool) {
        self.state.lock().running.insert(name.to_string(), running);
    }

    pub fn fail(&self, name: &str, operation: &'static str) {
        self.state.lock().failing.insert((name.to_string(), operation));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

impl ServiceManager for MockManager {
    async fn execute(&self, name: &str, operation: Operation) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(format!("{} {}", operation, name));

        if state.failing.contains(&(name.to_string(), operation.as_str())) {
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
            Operation::Log { limit } => Ok(format!("{} lines of {}", limit, name)),
            Operation::Enable | Operation::Disable | Operation::Update { .. } => Ok(String::new()),
        }
    }
}
