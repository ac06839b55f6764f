//! HTTP API handlers for artgraph-discovery

pub mod auth;
pub mod discovery;
pub mod graph;
pub mod health;
pub mod sse;

pub use auth::auth_middleware;
pub use discovery::{run_discovery, stream_discovery};
pub use graph::{get_analysis, get_artist};
pub use health::health_routes;
pub use sse::event_stream;
