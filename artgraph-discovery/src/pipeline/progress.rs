//! Progress reporting for a single discovery run

use artgraph_common::events::{DiscoveryEvent, EventBus, ProgressEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Where a run's progress events go
///
/// Events are forwarded to the caller's channel (streaming variant) and
/// published on the process-wide bus. Both are lossy: a closed channel or a
/// bus without subscribers never affects the run.
#[derive(Clone)]
pub struct ProgressSink {
    request_id: Uuid,
    subject: String,
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    bus: Option<Arc<EventBus>>,
}

impl ProgressSink {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            subject: subject.into(),
            tx: None,
            bus: None,
        }
    }

    pub fn with_channel(mut self, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(bus) = &self.bus {
            bus.emit_lossy(DiscoveryEvent::new(
                self.request_id,
                self.subject.as_str(),
                event.clone(),
            ));
        }
        if let Some(tx) = &self.tx {
            // Receiver gone means the client disconnected; keep running
            let _ = tx.send(event);
        }
    }

    pub fn status(&self, message: impl Into<String>, percent: u8) {
        self.emit(ProgressEvent::status(message, percent));
    }

    pub fn partial(&self, phase: &str, data: serde_json::Value) {
        self.emit(ProgressEvent::partial(phase, data));
    }
}
