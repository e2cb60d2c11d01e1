use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::events::{EventReceiver, EventType, SystemEvent, event_channel};
use crate::manager::{AllStatuses, ServiceManager};
use crate::registry::Registry;

/// Ground truth for the reconciliation stage
pub trait StatusSource: Send + Sync + 'static {
    fn refresh_status(&self) -> impl Future<Output = AllStatuses> + Send;
}

impl<M: ServiceManager> StatusSource for Registry<M> {
    async fn refresh_status(&self) -> AllStatuses {
        Registry::refresh_status(self).await
    }
}

/// Forward upstream events and, every `interval`, synthesize `Started` or
/// `Stopped` for each tracked service from a fresh status poll.
///
/// The first poll happens one interval after the stage starts. A zero
/// interval disables polling.
pub fn with_reconcile<S: StatusSource>(
    mut upstream: EventReceiver,
    source: S,
    interval: Duration,
    capacity: usize,
) -> EventReceiver {
    let (tx, rx) = event_channel(capacity);
    let polling = !interval.is_zero();
    if !polling {
        warn!("Status polling disabled (zero check interval)");
    }
    let period = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                event = upstream.recv() => {
                    let Some(event) = event else { break };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick(), if polling => {
                    let statuses = source.refresh_status().await;
                    debug!("Polled {} services", statuses.services.len());
                    for status in statuses.services {
                        let event_type = if status.is_running() {
                            EventType::Started
                        } else {
                            EventType::Stopped
                        };
                        if tx.send(SystemEvent::new(event_type, status.name)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
        debug!("Reconciliation stage closed");
    });

    rx
}
