use crate::errors::{DaemonError, Result};
use crate::manager::ServiceManager;
use crate::registry::Registry;

/// Reply sent when a control command succeeds
pub const REPLY_OK: &str = "OK";

/// Operator command accepted from chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Start,
    Stop,
    Restart,
    Update,
    Help,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Status,
        Command::Start,
        Command::Stop,
        Command::Restart,
        Command::Update,
        Command::Help,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Restart => "restart",
            Command::Update => "update",
            Command::Help => "help",
        }
    }

    pub fn lookup(name: &str) -> Option<Command> {
        let name = name.strip_prefix('/').unwrap_or(name);
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Split message text into a command and its trimmed argument.
    /// Returns `None` for unknown commands.
    pub fn parse(text: &str) -> Option<(Command, &str)> {
        let text = text.trim_start();
        let (name, arg) = text.split_once(' ').unwrap_or((text, ""));
        Self::lookup(name).map(|command| (command, arg.trim()))
    }

    /// Run the command against the registry and build the reply text
    pub async fn execute<M: ServiceManager>(
        &self,
        registry: &Registry<M>,
        arg: &str,
    ) -> Result<String> {
        match self {
            Command::Status if arg.is_empty() => {
                let all = registry.refresh_status().await;
                let lines: Vec<String> = all
                    .services
                    .iter()
                    .map(|s| format!("{} {} is {}", s.icon(), s.name, s.status))
                    .collect();
                Ok(lines.join("\n"))
            }
            Command::Status => {
                let status = registry.status(arg).await;
                Ok(format!("{} {} is {}", status.icon(), arg, status.status))
            }
            Command::Help => Ok(help_text()),
            _ if arg.is_empty() => Err(DaemonError::ArgumentRequired),
            Command::Start => registry.run(arg).await.map(|_| REPLY_OK.to_string()),
            Command::Stop => registry.stop(arg).await.map(|_| REPLY_OK.to_string()),
            Command::Restart => registry.restart(arg).await.map(|_| REPLY_OK.to_string()),
            Command::Update => registry.update(arg).await.map(|_| REPLY_OK.to_string()),
        }
    }
}

fn help_text() -> String {
    let mut names: Vec<&str> = Command::ALL.iter().map(Command::name).collect();
    names.sort_unstable();
    format!("commands:\n\n{}", names.join("\n"))
}
