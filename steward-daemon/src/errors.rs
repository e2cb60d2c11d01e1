use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("service not exists: {0}")]
    ServiceNotExists(String),

    #[error("Service already tracked: {0}")]
    ServiceAlreadyTracked(String),

    #[error("invalid service name: '{0}'")]
    InvalidServiceName(String),

    #[error("group already exists: {0}")]
    GroupExists(String),

    #[error("{operation} failed for service {service}: {message}")]
    Command {
        service: String,
        operation: String,
        message: String,
    },

    #[error("Failed to resolve working directory '{path}': {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write unit file '{path}': {source}")]
    UnitFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist registry to '{path}': {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Failed to load registry from '{path}': {message}")]
    Load { path: PathBuf, message: String },

    #[error("invalid user or password")]
    InvalidCredentials,

    #[error("{service} was updated but failed to start again: {source}")]
    RestartAfterUpdate {
        service: String,
        #[source]
        source: Box<DaemonError>,
    },

    #[error("{service} {event} hook failed ({message})")]
    HookFailed {
        service: String,
        event: String,
        message: String,
    },

    #[error("argument required")]
    ArgumentRequired,

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
