//! ABOUTME: EventBus implementation with async pub/sub and pattern-based routing
//! ABOUTME: No persistence or flow control: the producers here are internal workers, not external clients

use crate::event::P8fsEvent;
use crate::pattern::EventPattern;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

struct Subscription {
    #[allow(dead_code)]
    id: Uuid,
    pattern: EventPattern,
    sender: mpsc::UnboundedSender<P8fsEvent>,
}

/// In-process event bus shared by the ingest pipeline, the dreaming
/// scheduler, and any caller that wants to observe job status transitions.
pub struct EventBus {
    subscriptions: Arc<DashMap<Uuid, Subscription>>,
    broadcast_tx: broadcast::Sender<P8fsEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(10_000);
        Self { subscriptions: Arc::new(DashMap::new()), broadcast_tx }
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Never fails: a publish with no subscribers is a normal, expected
    /// state (most deployments run with nothing watching `ingest.*`).
    pub fn publish(&self, event: P8fsEvent) {
        if self.broadcast_tx.send(event.clone()).is_err() {
            debug!(event_type = %event.event_type, "no broadcast receivers");
        }
        for entry in self.subscriptions.iter() {
            if entry.value().pattern.matches(&event.event_type) {
                let _ = entry.value().sender.send(event.clone());
            }
        }
    }

    /// Subscribe to events whose type matches `pattern` (e.g. `"job.*"`).
    pub fn subscribe(&self, pattern: &str) -> Result<mpsc::UnboundedReceiver<P8fsEvent>, SubscribeError> {
        let event_pattern = EventPattern::new(pattern).map_err(SubscribeError::InvalidPattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscriptions.insert(id, Subscription { id, pattern: event_pattern, sender: tx });
        Ok(rx)
    }

    /// Subscribe to the raw broadcast stream, bypassing pattern filtering.
    #[must_use]
    pub fn subscribe_all(&self) -> broadcast::Receiver<P8fsEvent> {
        self.broadcast_tx.subscribe()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("invalid event pattern: {0}")]
    InvalidPattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use p8fs_core::{Json, TenantId};

    #[tokio::test]
    async fn subscriber_receives_matching_event_only() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("job.*").unwrap();

        bus.publish(P8fsEvent::new("job.completed", TenantId::new("tenant-A"), Json::null()));
        bus.publish(P8fsEvent::new("ingest.object_created", TenantId::new("tenant-A"), Json::null()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "job.completed");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_pattern_rejected() {
        let bus = EventBus::new();
        assert!(bus.subscribe("").is_err());
    }
}
