//! Event pipeline.
//!
//! Every stage is a task that owns its input receiver and returns the receiver
//! of its output. Stages close their output once their input is closed and
//! drained, so [`Registry::close`](crate::registry::Registry::close) shuts
//! the whole chain down in order.
//!
//! ```text
//! registry ─► reconcile ─► dedup ─► [hook] ─► tee ─► sinks
//! ```

use std::time::Duration;

use crate::events::{EVENT_CHANNEL_CAPACITY, EventReceiver};

mod dedup;
mod hooks;
mod logger;
mod reconcile;
mod tee;

pub use dedup::{DedupFilter, with_dedup};
pub use hooks::{HookRunner, with_hook};
pub use logger::{log_events, spawn_logger};
pub use reconcile::{StatusSource, with_reconcile};
pub use tee::tee;

/// Default period between ground-truth polls
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub check_interval: Duration,
    /// Shell command run for every event, if any
    pub hook: Option<String>,
    /// Capacity of every inter-stage channel
    pub capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            hook: None,
            capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Chain reconciliation, dedup and the optional hook onto a raw event stream
pub fn build<S: StatusSource>(
    events: EventReceiver,
    source: S,
    settings: &PipelineSettings,
) -> EventReceiver {
    let events = with_reconcile(events, source, settings.check_interval, settings.capacity);
    let events = with_dedup(events, settings.capacity);
    match settings.hook.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            with_hook(events, HookRunner::new(command), settings.capacity)
        }
        _ => events,
    }
}
