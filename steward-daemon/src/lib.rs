//! Steward: a service-control daemon.
//!
//! The [`registry::Registry`] controls services through a
//! [`manager::ServiceManager`] and emits a [`events::SystemEvent`] for every
//! successful action. Events flow through the [`pipeline`] (status
//! reconciliation, dedup, an optional hook) into the sinks: the log, the
//! [`live`] websocket feed and the chat [`notifier`].

pub mod config;
pub mod errors;
pub mod events;
pub mod live;
pub mod manager;
pub mod notifier;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod unit;

pub use errors::{DaemonError, Result};
pub use events::{EventType, SystemEvent};
pub use registry::Registry;
