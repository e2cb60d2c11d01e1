use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::EventReceiver;

/// Log every event until the stream closes
pub async fn log_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        info!(
            service = %event.name,
            event = %event.event_type,
            at = %event.timestamp.to_rfc3339(),
            "{} {}",
            event.event_type.icon(),
            event
        );
    }
    debug!("Event logger stopped");
}

pub fn spawn_logger(events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(log_events(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventType, SystemEvent, event_channel};

    #[tokio::test]
    async fn test_logger_drains_until_closed() {
        let (tx, rx) = event_channel(2);
        let handle = spawn_logger(rx);

        tx.send(SystemEvent::new(EventType::Started, "web")).await.unwrap();
        tx.send(SystemEvent::new(EventType::Stopped, "web")).await.unwrap();
        drop(tx);

        handle.await.unwrap();
    }
}
