//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for committed-canvas
//! [`BehavioralEvent`]s. The execution engine publishes after a successful
//! commit only; subscribers (live canvas refresh, diagnostics) each receive
//! every event independently. Persisted telemetry does not flow through the
//! bus — the engine writes it synchronously through the firewall so the
//! commit/emit ordering stays observable.

use ideaflow_core::telemetry::BehavioralEvent;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published event. Designed to be shared via
/// `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<BehavioralEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; telemetry
    /// persistence never depends on the bus.
    pub fn publish(&self, event: BehavioralEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BehavioralEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::telemetry::BehavioralEventKind;

    fn event(kind: BehavioralEventKind) -> BehavioralEvent {
        BehavioralEvent::new(kind, 1, 42, chrono::Utc::now())
            .with_payload(serde_json::json!({ "auto_generated": true }))
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(event(BehavioralEventKind::ContainerMoved));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.kind, BehavioralEventKind::ContainerMoved);
        assert_eq!(received.workspace_id, 1);
        assert_eq!(received.payload["auto_generated"], true);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(event(BehavioralEventKind::LayoutReset));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.kind, BehavioralEventKind::LayoutReset);
        assert_eq!(e2.kind, BehavioralEventKind::LayoutReset);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(event(BehavioralEventKind::NodeCreated));
    }
}
