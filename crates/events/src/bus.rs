//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is shared via `Arc<EventBus>` across the application.

use campus_core::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A student became enrolled in a course.
pub const ENROLLMENT_CREATED: &str = "enrollment.created";
/// A student stopped being enrolled in a course.
pub const ENROLLMENT_REMOVED: &str = "enrollment.removed";
/// An order reached `completed`.
pub const ORDER_COMPLETED: &str = "order.completed";
/// A provider-reported payment status was recorded.
pub const PAYMENT_UPDATED: &str = "payment.updated";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// An enrollment, order or payment fact, published after the transaction
/// that produced it commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// One of the names registered in `event_types`.
    pub event_type: String,
    /// `"enrollment"`, `"order"` or `"payment"`.
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    /// Set for admin-initiated changes.
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    /// Record the admin who caused the change.
    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// `enrollment.created` for the enrollment record `enrollment_id`.
    pub fn enrollment_created(
        enrollment_id: DbId,
        user_id: DbId,
        course_id: DbId,
        group_id: Option<DbId>,
    ) -> Self {
        Self::new(ENROLLMENT_CREATED)
            .with_source("enrollment", enrollment_id)
            .with_payload(serde_json::json!({
                "user_id": user_id,
                "course_id": course_id,
                "enrolled_by_group_id": group_id,
            }))
    }

    /// `enrollment.removed` for the enrollment record `enrollment_id`.
    pub fn enrollment_removed(enrollment_id: DbId, user_id: DbId, course_id: DbId) -> Self {
        Self::new(ENROLLMENT_REMOVED)
            .with_source("enrollment", enrollment_id)
            .with_payload(serde_json::json!({
                "user_id": user_id,
                "course_id": course_id,
            }))
    }

    /// `order.completed` for `order_id`, owned by `user_id`.
    pub fn order_completed(order_id: DbId, user_id: DbId, provider: &str) -> Self {
        Self::new(ORDER_COMPLETED)
            .with_source("order", order_id)
            .with_payload(serde_json::json!({
                "user_id": user_id,
                "provider": provider,
            }))
    }

    /// `payment.updated` for the payment row `payment_id`.
    pub fn payment_updated(
        payment_id: DbId,
        provider: &str,
        external_id: &str,
        status: &str,
        order_id: Option<DbId>,
    ) -> Self {
        Self::new(PAYMENT_UPDATED)
            .with_source("payment", payment_id)
            .with_payload(serde_json::json!({
                "provider": provider,
                "external_id": external_id,
                "status": status,
                "order_id": order_id,
            }))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Channel capacity used by [`EventBus::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of committed domain events to in-process subscribers.
///
/// Every subscriber sees every event published after it subscribed.
///
/// # Usage
///
/// ```rust
/// use campus_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::order_completed(1, 2, "free"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// A subscriber more than `capacity` events behind loses the oldest
    /// ones and sees `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver to current subscribers. Never blocks.
    pub fn publish(&self, event: PlatformEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Publish several events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = PlatformEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PlatformEvent::enrollment_created(42, 7, 9, Some(3)).with_actor(1));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, ENROLLMENT_CREATED);
        assert_eq!(received.source_entity_type.as_deref(), Some("enrollment"));
        assert_eq!(received.source_entity_id, Some(42));
        assert_eq!(received.actor_user_id, Some(1));
        assert_eq!(received.payload["course_id"], 9);
        assert_eq!(received.payload["enrolled_by_group_id"], 3);
    }

    #[tokio::test]
    async fn publish_all_preserves_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish_all([
            PlatformEvent::enrollment_created(1, 7, 9, None),
            PlatformEvent::order_completed(5, 7, "stripe"),
        ]);

        assert_eq!(rx.recv().await.unwrap().event_type, ENROLLMENT_CREATED);
        assert_eq!(rx.recv().await.unwrap().event_type, ORDER_COMPLETED);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::enrollment_removed(1, 2, 3));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, ENROLLMENT_REMOVED);
        assert_eq!(e2.event_type, ENROLLMENT_REMOVED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn payment_event_carries_external_reference() {
        let event = PlatformEvent::payment_updated(3, "mercadopago", "123", "approved", Some(8));
        assert_eq!(event.source_entity_id, Some(3));
        assert_eq!(event.payload["external_id"], "123");
        assert_eq!(event.payload["order_id"], 8);
        assert!(event.actor_user_id.is_none());
    }
}
