//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! The service crate wraps these with axum middleware.

pub mod auth;
pub mod types;

pub use auth::{authorize, parse_bearer, verify_token, ApiAuthError};
#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret, resolve_shared_secret};
pub use types::AuthErrorResponse;
