//! Server-Sent Events (SSE) utilities
//!
//! Every event is sent as a bare `data: <json>` frame with no `event:` name;
//! clients dispatch on the JSON `type` field.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

/// Keep-alive comment interval for long-lived streams
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize a value into a `data:` frame
///
/// Serialization failure degrades to an `error` frame rather than closing the stream.
pub fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("Failed to serialize SSE payload: {}", e);
            Event::default().data(r#"{"type":"error","message":"serialization failed"}"#)
        }
    }
}

/// Wrap an event stream in an SSE response with periodic keep-alive comments
pub fn sse_response<S>(stream: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}
