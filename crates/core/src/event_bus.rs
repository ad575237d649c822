//! Event publishing: how outcomes are announced to other subsystems.
//!
//! Components accept an `Arc<dyn EventPublisher>` and publish fire-and-forget
//! JSON payloads on named topics (NATS subjects in production). Delivery is
//! at-least-once, so consumers must tolerate duplicates.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fire-and-forget publisher. Implementations must not block the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: serde_json::Value);
}

/// Serialize `event` and hand it to `publisher`. Serialization failures are
/// logged and dropped, never returned.
pub fn publish_event<T: Serialize>(publisher: &dyn EventPublisher, topic: &str, event: &T) {
    match serde_json::to_value(event) {
        Ok(payload) => publisher.publish(topic, payload),
        Err(e) => warn!(topic = topic, error = %e, "Failed to serialize event, dropping"),
    }
}

/// Publisher that only logs. Used when no broker is configured.
pub struct NoOpPublisher;

impl EventPublisher for NoOpPublisher {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        debug!(topic = topic, payload = %payload, "Event dropped (no publisher configured)");
    }
}

/// In-memory publisher that records every event, for tests.
#[derive(Default)]
pub struct CapturePublisher {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl CapturePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventPublisher for CapturePublisher {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        self.events.lock().push((topic.to_string(), payload));
    }
}

pub fn noop_publisher() -> Arc<dyn EventPublisher> {
    Arc::new(NoOpPublisher)
}

pub fn capture_publisher() -> Arc<CapturePublisher> {
    Arc::new(CapturePublisher::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Swipe, SwipeAction, SwipeEvent};

    #[test]
    fn test_capture_publisher() {
        let publisher = capture_publisher();
        assert_eq!(publisher.count(), 0);

        let swipe = Swipe {
            from_user_id: 1,
            to_user_id: 2,
            action: SwipeAction::Like,
            message: None,
        };
        publish_event(publisher.as_ref(), "swipes", &SwipeEvent::from(&swipe));
        publisher.publish("geo", serde_json::json!({"user_id": 1, "status": "waited"}));

        assert_eq!(publisher.count(), 2);
        let swipes = publisher.on_topic("swipes");
        assert_eq!(swipes.len(), 1);
        assert_eq!(swipes[0]["action"], "like");
        assert_eq!(swipes[0]["to_user_id"], 2);

        publisher.clear();
        assert_eq!(publisher.count(), 0);
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = noop_publisher();
        // Should not panic
        publisher.publish("geo", serde_json::json!({}));
    }
}
