use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{FIELD_WORKDIR, Operation, Scope, ServiceManager};
use crate::errors::{DaemonError, Result};

const SYSTEMCTL: &str = "systemctl";
const JOURNALCTL: &str = "journalctl";
const SHELL: &str = "sh";

/// [`ServiceManager`] backed by `systemctl` / `journalctl`
#[derive(Debug, Clone)]
pub struct Systemctl {
    scope: Scope,
}

impl Systemctl {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    fn control_args(&self, name: &str, operation: &Operation) -> Vec<String> {
        let mut args = Vec::new();
        if self.scope.is_user() {
            args.push("--user".to_string());
        }
        match operation {
            Operation::Show { field } => {
                args.extend(["show", "-p", field.as_str(), "--value", name].map(String::from));
            }
            other => {
                args.push(other.as_str().to_string());
                args.push(name.to_string());
            }
        }
        args
    }

    fn journal_args(&self, name: &str, limit: usize) -> Vec<String> {
        let unit_flag = if self.scope.is_user() {
            "--user-unit"
        } else {
            "-u"
        };
        ["-m", "--no-pager", "-q", "-n"]
            .into_iter()
            .map(String::from)
            .chain([limit.to_string(), unit_flag.to_string(), name.to_string()])
            .collect()
    }

    async fn update(&self, name: &str, command: &str) -> Result<String> {
        let show = self.control_args(name, &Operation::show(FIELD_WORKDIR));
        let work_dir = run(name, "show", SYSTEMCTL, &show, None)
            .await
            .map(|out| parse_working_dir(&out))
            .unwrap_or_default();

        debug!("Updating {} in {:?}: {}", name, work_dir, command);
        let args = vec!["-c".to_string(), command.to_string()];
        run(name, "update", SHELL, &args, work_dir).await
    }
}

impl ServiceManager for Systemctl {
    async fn execute(&self, name: &str, operation: Operation) -> Result<String> {
        match operation {
            Operation::Log { limit } => {
                let args = self.journal_args(name, limit);
                let out = run(name, "log", JOURNALCTL, &args, None).await?;
                Ok(out.trim().to_string())
            }
            Operation::Update { command } => self.update(name, &command).await,
            Operation::Show { .. } => {
                let args = self.control_args(name, &operation);
                let out = run(name, "show", SYSTEMCTL, &args, None).await?;
                Ok(out.trim().to_string())
            }
            _ => {
                let args = self.control_args(name, &operation);
                run(name, operation.as_str(), SYSTEMCTL, &args, None).await
            }
        }
    }
}

/// `systemctl show -p WorkingDirectory --value` prefixes the path with `!`
/// when failures to enter the directory are ignored.
fn parse_working_dir(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    let path = trimmed.strip_prefix('!').unwrap_or(trimmed);
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

async fn run(
    service: &str,
    operation: &str,
    program: &str,
    args: &[String],
    work_dir: Option<PathBuf>,
) -> Result<String> {
    debug!("Running {} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = work_dir {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|e| DaemonError::Command {
        service: service.to_string(),
        operation: operation.to_string(),
        message: format!("failed to spawn {}: {}", program, e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match output.status.code() {
            Some(code) if stderr.trim().is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, stderr.trim()),
            None => "killed by signal".to_string(),
        };
        return Err(DaemonError::Command {
            service: service.to_string(),
            operation: operation.to_string(),
            message,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
