//! Discovery endpoints
//!
//! `POST /discovery/run` answers with the full response once the run is done.
//! `POST /discovery/stream` answers immediately with an SSE stream of progress
//! events; the run continues in a spawned task even if the client goes away.

use artgraph_common::events::ProgressEvent;
use artgraph_common::sse::{json_event, sse_response};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::models::{DiscoveryRequest, DiscoveryResponse};
use crate::pipeline::{DiscoveryPipeline, ProgressSink};
use crate::AppState;

/// POST /discovery/run
pub async fn run_discovery(
    State(state): State<AppState>,
    Json(request): Json<DiscoveryRequest>,
) -> ApiResult<Json<DiscoveryResponse>> {
    let progress =
        ProgressSink::new(request.subject_name.trim()).with_bus(state.event_bus.clone());

    let response = state.pipeline.run(&request, &progress).await?;
    state.record_run_errors(&response).await;

    Ok(Json(response))
}

/// POST /discovery/stream
///
/// Validation happens before the stream opens, so an empty subject is a plain
/// 400 rather than an `error` event.
pub async fn stream_discovery(
    State(state): State<AppState>,
    Json(request): Json<DiscoveryRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    DiscoveryPipeline::validate(&request)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress = ProgressSink::new(request.subject_name.trim())
        .with_channel(tx)
        .with_bus(state.event_bus.clone());

    info!(
        subject = %request.subject_name.trim(),
        request_id = %progress.request_id(),
        "Streaming discovery started"
    );

    let task_state = state.clone();
    tokio::spawn(async move {
        match task_state.pipeline.run(&request, &progress).await {
            Ok(response) => task_state.record_run_errors(&response).await,
            Err(e) => warn!("Streaming discovery rejected: {}", e),
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield Ok(json_event(&event));
            if terminal {
                break;
            }
        }
    };

    Ok(sse_response(stream))
}
