use std::collections::HashMap;

use tracing::{debug, trace};

use crate::events::{EventReceiver, EventType, SystemEvent, event_channel};

/// Suppresses repeated `Started`/`Stopped` transitions per service.
///
/// A service with no recorded state lets both transitions through.
#[derive(Debug, Default)]
pub struct DedupFilter {
    running: HashMap<String, bool>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `event` goes downstream, updating the recorded state
    pub fn admit(&mut self, event: &SystemEvent) -> bool {
        let running = match event.event_type {
            EventType::Started => true,
            EventType::Stopped => false,
            _ => return true,
        };
        let previous = self.running.insert(event.name.clone(), running);
        previous != Some(running)
    }

    /// Last observed state of a service
    pub fn state(&self, name: &str) -> Option<bool> {
        self.running.get(name).copied()
    }
}

pub fn with_dedup(mut upstream: EventReceiver, capacity: usize) -> EventReceiver {
    let (tx, rx) = event_channel(capacity);
    tokio::spawn(async move {
        let mut filter = DedupFilter::new();
        while let Some(event) = upstream.recv().await {
            if !filter.admit(&event) {
                trace!("Suppressed duplicate {}", event);
                continue;
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }
        debug!("Dedup stage closed");
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, name: &str) -> SystemEvent {
        SystemEvent::new(event_type, name)
    }

    #[test]
    fn test_unknown_state_passes_both() {
        let mut a = DedupFilter::new();
        assert!(a.admit(&event(EventType::Started, "web")));
        let mut b = DedupFilter::new();
        assert!(b.admit(&event(EventType::Stopped, "web")));
    }

    #[test]
    fn test_repeated_transitions_suppressed() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit(&event(EventType::Started, "web")));
        assert!(!filter.admit(&event(EventType::Started, "web")));
        assert!(filter.admit(&event(EventType::Stopped, "web")));
        assert!(!filter.admit(&event(EventType::Stopped, "web")));
        assert!(filter.admit(&event(EventType::Started, "web")));
        assert_eq!(filter.state("web"), Some(true));
    }

    #[test]
    fn test_services_tracked_independently() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit(&event(EventType::Started, "web")));
        assert!(filter.admit(&event(EventType::Started, "db")));
        assert_eq!(filter.state("cache"), None);
    }

    #[test]
    fn test_other_events_untouched() {
        let mut filter = DedupFilter::new();
        for _ in 0..2 {
            assert!(filter.admit(&event(EventType::Restarted, "web")));
            assert!(filter.admit(&event(EventType::Updated, "web")));
        }
        assert_eq!(filter.state("web"), None);
    }

    #[tokio::test]
    async fn test_stage_filters_stream() {
        let (tx, rx) = event_channel(8);
        let mut out = with_dedup(rx, 8);

        for event_type in [
            EventType::Started,
            EventType::Started,
            EventType::Restarted,
            EventType::Stopped,
            EventType::Stopped,
        ] {
            tx.send(event(event_type, "web")).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(event) = out.recv().await {
            seen.push(event.event_type);
        }
        assert_eq!(
            seen,
            vec![EventType::Started, EventType::Restarted, EventType::Stopped]
        );
    }
}
