//! Request-scoped discovery pipeline

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{DiscoveryPipeline, PipelineError};
pub use progress::ProgressSink;
