//! Live event feed.
//!
//! A single hub task owns the subscriber set. Subscribe, unsubscribe and
//! broadcast requests arrive on separate channels and are handled one at a
//! time, so no lock guards the set. Each event is serialized once and pushed
//! to every subscriber's outbox with `try_send`; a subscriber whose outbox is
//! full or closed is dropped on the spot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{DaemonError, Result};
use crate::events::EventReceiver;

mod ws;

pub use ws::{Authenticator, parse_basic_auth, serve};

/// Identifier of one subscriber
pub type ConnectionId = u64;

/// Serialized event, shared by every outbox
pub type Payload = Arc<str>;

/// Per-subscriber outbox capacity
pub const OUTBOX_CAPACITY: usize = 32;

const CONTROL_CAPACITY: usize = 16;

/// Registration returned by [`LiveHandle::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub outbox: mpsc::Receiver<Payload>,
}

/// Handle for registering subscribers with the hub
#[derive(Clone)]
pub struct LiveHandle {
    subscribe_tx: mpsc::Sender<(ConnectionId, mpsc::Sender<Payload>)>,
    unsubscribe_tx: mpsc::Sender<ConnectionId>,
    next_id: Arc<AtomicU64>,
    subscribers: Arc<AtomicUsize>,
}

impl LiveHandle {
    /// Register a new subscriber
    pub async fn subscribe(&self) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, outbox) = mpsc::channel(OUTBOX_CAPACITY);
        self.subscribe_tx
            .send((id, tx))
            .await
            .map_err(|_| DaemonError::Internal("live hub stopped".into()))?;
        Ok(Subscription { id, outbox })
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: ConnectionId) {
        if self.unsubscribe_tx.send(id).await.is_err() {
            debug!("Live hub already stopped, nothing to unsubscribe");
        }
    }

    /// Number of subscribers as of the hub's last change
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

/// Start the hub on `events`. The hub stops, closing every outbox, when the
/// event stream closes.
pub fn spawn_hub(events: EventReceiver) -> (LiveHandle, JoinHandle<()>) {
    let (subscribe_tx, subscribe_rx) = mpsc::channel(CONTROL_CAPACITY);
    let (unsubscribe_tx, unsubscribe_rx) = mpsc::channel(CONTROL_CAPACITY);
    let subscribers = Arc::new(AtomicUsize::new(0));

    let handle = LiveHandle {
        subscribe_tx,
        unsubscribe_tx,
        next_id: Arc::new(AtomicU64::new(1)),
        subscribers: Arc::clone(&subscribers),
    };
    let task = tokio::spawn(run_hub(events, subscribe_rx, unsubscribe_rx, subscribers));
    (handle, task)
}

async fn run_hub(
    mut events: EventReceiver,
    mut subscribe_rx: mpsc::Receiver<(ConnectionId, mpsc::Sender<Payload>)>,
    mut unsubscribe_rx: mpsc::Receiver<ConnectionId>,
    gauge: Arc<AtomicUsize>,
) {
    let mut subscribers: Vec<(ConnectionId, mpsc::Sender<Payload>)> = Vec::new();

    loop {
        tokio::select! {
            Some((id, tx)) = subscribe_rx.recv() => {
                debug!("Subscriber {} joined", id);
                subscribers.push((id, tx));
            }
            Some(id) = unsubscribe_rx.recv() => {
                debug!("Subscriber {} left", id);
                subscribers.retain(|(sid, _)| *sid != id);
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let payload: Payload = match serde_json::to_string_pretty(&event) {
                    Ok(json) => json.into(),
                    Err(e) => {
                        warn!("Failed to serialize {}: {}", event, e);
                        continue;
                    }
                };
                subscribers.retain(|(id, tx)| match tx.try_send(Arc::clone(&payload)) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Dropping subscriber {}: {}", id, e);
                        false
                    }
                });
            }
        }
        gauge.store(subscribers.len(), Ordering::Relaxed);
    }

    info!("Live feed closed, dropping {} subscribers", subscribers.len());
    subscribers.clear();
    gauge.store(0, Ordering::Relaxed);
}
