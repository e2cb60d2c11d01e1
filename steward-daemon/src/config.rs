//! Daemon command-line configuration.
//!
//! Every flag can also be set through the environment variable named next
//! to it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use tracing::Level;

use crate::errors::{DaemonError, Result};
use crate::events::EVENT_CHANNEL_CAPACITY;
use crate::notifier::{DEFAULT_TEMPLATE, NotifierSettings};
use crate::persistence::DEFAULT_CONFIG_PATH;
use crate::pipeline::PipelineSettings;
use crate::registry::{DEFAULT_UPDATE_COMMAND, RegistryOptions};

mod duration;

pub use duration::{format_duration, parse_duration};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Steward daemon - service control with an event pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "stewardd", version)]
pub struct DaemonArgs {
    /// Registry configuration file
    #[arg(long, env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: PathBuf,

    /// Address of the live event feed
    #[arg(long, env = "BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// Shell command run in a service's working directory on update
    #[arg(long, env = "UPDATE_COMMAND", default_value = DEFAULT_UPDATE_COMMAND)]
    pub update_command: String,

    /// Period between status polls (e.g. 10s, 5m, 100ms; 0 disables)
    #[arg(long, env = "CHECK_INTERVAL", default_value = "10s", value_parser = parse_duration)]
    pub check_interval: Duration,

    /// Shell command run for every event with SERVICE and EVENT set
    #[arg(long, env = "HOOK")]
    pub hook: Option<String>,

    /// Capacity of each pipeline channel
    #[arg(long, env = "EVENT_BUFFER", default_value_t = EVENT_CHANNEL_CAPACITY)]
    pub event_buffer: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub telegram: TelegramArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TelegramArgs {
    /// Send events to Telegram and accept commands from admins
    #[arg(long = "telegram-enable", env = "TELEGRAM_ENABLE")]
    pub enable: bool,

    /// Bot token
    #[arg(long = "telegram-token", env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Chat or channel receiving events
    #[arg(
        long = "telegram-chat-id",
        env = "TELEGRAM_CHAT_ID",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub chat_id: i64,

    /// Message template; {name} and {event} are substituted
    #[arg(long = "telegram-template", env = "TELEGRAM_TEMPLATE", default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Comma-separated user ids allowed to run commands
    #[arg(
        long = "telegram-admins",
        env = "TELEGRAM_ADMINS",
        value_delimiter = ',',
        allow_negative_numbers = true
    )]
    pub admins: Vec<i64>,
}

impl DaemonArgs {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            update_command: self.update_command.clone(),
            event_capacity: self.event_buffer,
            unit_dir: None,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            check_interval: self.check_interval,
            hook: self.hook.clone().filter(|h| !h.trim().is_empty()),
            capacity: self.event_buffer,
        }
    }
}

impl TelegramArgs {
    /// Bot token, required once the notifier is enabled
    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DaemonError::Telegram("--telegram-token is required when enabled".into())
            })
    }

    pub fn settings(&self) -> NotifierSettings {
        NotifierSettings {
            chat_id: self.chat_id,
            template: self.template.clone(),
            admins: self.admins.clone(),
        }
    }
}
