//! artgraph-discovery library interface
//!
//! Cross-source artist relationship fusion: source adapters, entity
//! resolution, relationship fusion, the analysis cache, the request pipeline
//! and the HTTP router that exposes them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fusion;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use artgraph_common::events::EventBus;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::cache::AnalysisCache;
use crate::models::DiscoveryResponse;
use crate::pipeline::DiscoveryPipeline;
use crate::store::GraphStore;

/// Event bus capacity for the `/events` monitor
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: Arc<EventBus>,
    pub pipeline: Arc<DiscoveryPipeline>,
    pub store: Arc<dyn GraphStore>,
    pub cache: AnalysisCache,
    pub shared_secret: Arc<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        pipeline: Arc<DiscoveryPipeline>,
        store: Arc<dyn GraphStore>,
        shared_secret: String,
    ) -> Self {
        Self {
            cache: pipeline.cache().clone(),
            db,
            event_bus: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
            pipeline,
            store,
            shared_secret: Arc::new(shared_secret),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember the last error a run logged, for `/health`
    pub async fn record_run_errors(&self, response: &DiscoveryResponse) {
        if let Some(entry) = response.results.error_log.last() {
            *self.last_error.write().await = Some(format!("{}: {}", entry.step, entry.error));
        }
    }
}

/// Build application router
///
/// `/health` is public; everything else requires the shared-secret bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/discovery/run", post(api::run_discovery))
        .route("/discovery/stream", post(api::stream_discovery))
        .route("/analysis", get(api::get_analysis))
        .route("/artists/:slug", get(api::get_artist))
        .route("/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
