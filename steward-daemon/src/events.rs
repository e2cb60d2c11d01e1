//! System events emitted by the registry and carried through the pipeline.
//!
//! Every stage of the pipeline is connected to its neighbours by a bounded
//! MPSC channel created with [`event_channel`]. A full channel makes the
//! sender wait, so events are never dropped between stages; the price is that
//! the slowest stage bounds the throughput of everything upstream of it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Kind of lifecycle transition or administrative action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Removed,
    Started,
    Restarted,
    Stopped,
    Updated,
    Enabled,
    Disabled,
    Joined,
    Left,
}

impl EventType {
    /// Lower-case name, used for hook environment and serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Removed => "removed",
            EventType::Started => "started",
            EventType::Restarted => "restarted",
            EventType::Stopped => "stopped",
            EventType::Updated => "updated",
            EventType::Enabled => "enabled",
            EventType::Disabled => "disabled",
            EventType::Joined => "joined",
            EventType::Left => "left",
        }
    }

    /// Icon prefixed to chat notifications
    pub fn icon(&self) -> &'static str {
        match self {
            EventType::Created => "\u{2795}",
            EventType::Removed => "🗑️",
            EventType::Started => "👌",
            EventType::Restarted => "♻️",
            EventType::Stopped => "✋",
            EventType::Updated => "✔️",
            EventType::Enabled => "☑️",
            EventType::Disabled => "⛔",
            EventType::Joined => "\u{26D3}",
            EventType::Left => "❗",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of something that happened to a named service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl SystemEvent {
    /// Create a new event stamped with the current time
    pub fn new(event_type: EventType, name: impl Into<String>) -> Self {
        Self {
            event_type,
            name: name.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.event_type)
    }
}

pub type EventSender = mpsc::Sender<SystemEvent>;
pub type EventReceiver = mpsc::Receiver<SystemEvent>;

/// Default capacity of every inter-stage channel
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Create a bounded event channel. Capacity is clamped to at least 1.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}
