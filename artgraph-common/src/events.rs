//! Event types for the artgraph event system
//!
//! A discovery run reports progress as a sequence of [`ProgressEvent`]s. The
//! streaming endpoint forwards them to its caller; every event is also published
//! on the process-wide [`EventBus`] wrapped in a [`DiscoveryEvent`] carrying the
//! request id, so monitoring clients can follow all runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One progress notification from a discovery run
///
/// Serializes with a `type` tag: `status`, `partial_result`, `final_result`, `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Human-readable status with overall completion percentage
    Status { message: String, percent: u8 },

    /// Data from one completed phase
    PartialResult {
        phase: String,
        data: serde_json::Value,
    },

    /// Terminal event carrying the full response
    FinalResult { data: serde_json::Value },

    /// Terminal event for a run that could not produce a response
    Error { message: String },
}

impl ProgressEvent {
    pub fn status(message: impl Into<String>, percent: u8) -> Self {
        ProgressEvent::Status {
            message: message.into(),
            percent: percent.min(100),
        }
    }

    pub fn partial(phase: impl Into<String>, data: serde_json::Value) -> Self {
        ProgressEvent::PartialResult {
            phase: phase.into(),
            data,
        }
    }

    /// True for `final_result` and `error`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::FinalResult { .. } | ProgressEvent::Error { .. }
        )
    }
}

/// A progress event tagged with the run it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub request_id: Uuid,
    pub subject_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl DiscoveryEvent {
    pub fn new(request_id: Uuid, subject_name: impl Into<String>, event: ProgressEvent) -> Self {
        Self {
            request_id,
            subject_name: subject_name.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Process-wide broadcast of discovery events
///
/// Lagging subscribers lose the oldest events; publishers never block.
pub struct EventBus {
    tx: broadcast::Sender<DiscoveryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use artgraph_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DiscoveryEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_wire_shape() {
        let json = serde_json::to_value(ProgressEvent::status("Checking cache", 10)).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "Checking cache");
        assert_eq!(json["percent"], 10);

        let json = serde_json::to_value(ProgressEvent::FinalResult {
            data: serde_json::json!({"success": true}),
        })
        .unwrap();
        assert_eq!(json["type"], "final_result");
        assert_eq!(json["data"]["success"], true);
    }

    #[test]
    fn test_status_percent_clamped() {
        match ProgressEvent::status("done", 250) {
            ProgressEvent::Status { percent, .. } => assert_eq!(percent, 100),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_discovery_event_flattens_progress() {
        let id = Uuid::new_v4();
        let event = DiscoveryEvent::new(id, "Steve Reid", ProgressEvent::partial("ai_reasoning", serde_json::json!([])));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["request_id"], id.to_string());
        assert_eq!(json["type"], "partial_result");
        assert_eq!(json["phase"], "ai_reasoning");

        let back: DiscoveryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let id = Uuid::new_v4();
        bus.emit_lossy(DiscoveryEvent::new(id, "X", ProgressEvent::status("hi", 1)));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.request_id, id);
        assert!(!received.event.is_terminal());
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(DiscoveryEvent::new(
            Uuid::new_v4(),
            "X",
            ProgressEvent::Error { message: "x".into() },
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
