//! Server-Sent Events (SSE) monitor of all discovery runs

use artgraph_common::sse::{json_event, sse_response};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// GET /events
///
/// Every progress event of every run, tagged with its request id.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to discovery events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!(request_id = %event.request_id, "SSE: forwarding discovery event");
                    yield Ok(json_event(&event));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: monitor lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    sse_response(stream)
}
