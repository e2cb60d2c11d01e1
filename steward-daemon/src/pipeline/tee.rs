use tracing::debug;

use crate::events::{EventReceiver, EventSender, event_channel};

/// Duplicate a stream into two. Each event goes to the first output, then the
/// second. An output whose receiver is gone is skipped from then on; the
/// stage stops once both are gone or the input closes.
pub fn tee(mut upstream: EventReceiver, capacity: usize) -> (EventReceiver, EventReceiver) {
    let (tx_a, rx_a) = event_channel(capacity);
    let (tx_b, rx_b) = event_channel(capacity);

    tokio::spawn(async move {
        let mut outputs: [Option<EventSender>; 2] = [Some(tx_a), Some(tx_b)];
        while let Some(event) = upstream.recv().await {
            for (index, slot) in outputs.iter_mut().enumerate() {
                if let Some(tx) = slot
                    && tx.send(event.clone()).await.is_err()
                {
                    debug!("Tee output {} closed", index);
                    *slot = None;
                }
            }
            if outputs.iter().all(Option::is_none) {
                break;
            }
        }
        debug!("Tee stage closed");
    });

    (rx_a, rx_b)
}
