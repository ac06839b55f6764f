//! # artgraph Common Library
//!
//! Shared code for the artgraph services including:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Shared-secret authentication primitives
//! - SQLite initialization and graph schema
//! - Discovery event types and the event bus
//! - SSE helpers

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
