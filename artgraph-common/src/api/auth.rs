//! Shared-secret bearer authentication
//!
//! # Architecture
//!
//! - Protected requests carry `Authorization: Bearer <secret>`
//! - The secret is a single value shared by all callers
//! - Secret resolution: database `settings.api_shared_secret` → ENV → TOML;
//!   if none is configured a random secret is generated and stored in the database
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions and database operations.
//! No HTTP framework dependencies - the axum middleware lives in the service crate.

use sha2::{Digest, Sha256};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings-table key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Environment variable holding the shared secret
pub const ENV_SHARED_SECRET: &str = "ARTGRAPH_SHARED_SECRET";

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header
    MissingToken,

    /// Authorization header present but not `Bearer <token>`
    MalformedHeader,

    /// Token does not match the shared secret
    InvalidToken,

    /// Database error loading or storing the shared secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingToken => write!(f, "Missing bearer token"),
            ApiAuthError::MalformedHeader => write!(f, "Malformed Authorization header"),
            ApiAuthError::InvalidToken => write!(f, "Invalid bearer token"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Token Validation
// ========================================

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use artgraph_common::api::auth::parse_bearer;
///
/// assert_eq!(parse_bearer(Some("Bearer abc")).unwrap(), "abc");
/// assert!(parse_bearer(Some("Basic abc")).is_err());
/// assert!(parse_bearer(None).is_err());
/// ```
pub fn parse_bearer(header: Option<&str>) -> Result<&str, ApiAuthError> {
    let header = header.ok_or(ApiAuthError::MissingToken)?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(ApiAuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MalformedHeader);
    }
    Ok(token)
}

/// Compare a provided token against the shared secret
///
/// Both sides are hashed first so the comparison runs over fixed-length digests.
pub fn verify_token(provided: &str, shared_secret: &str) -> Result<(), ApiAuthError> {
    let provided_digest = Sha256::digest(provided.as_bytes());
    let secret_digest = Sha256::digest(shared_secret.as_bytes());

    let diff = provided_digest
        .iter()
        .zip(secret_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    if diff == 0 {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidToken)
    }
}

/// Parse and verify an `Authorization` header in one step
pub fn authorize(header: Option<&str>, shared_secret: &str) -> Result<(), ApiAuthError> {
    let token = parse_bearer(header)?;
    verify_token(token, shared_secret)
}

/// Generate a random 256-bit secret as 64 hex characters
pub fn generate_secret() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings (None when absent or blank)
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<Option<String>, ApiAuthError> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(result
        .map(|(value,)| value)
        .filter(|value| !value.trim().is_empty()))
}

/// Generate and store a new shared secret
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let secret = generate_secret();

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(&secret)
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

/// Resolve the shared secret: Database → ENV → TOML → generated
#[cfg(feature = "sqlx")]
pub async fn resolve_shared_secret(
    db: &SqlitePool,
    toml_secret: Option<&String>,
) -> Result<String, ApiAuthError> {
    let db_secret = load_shared_secret(db).await?;

    if let Some((secret, source)) =
        crate::config::resolve_layered(db_secret, ENV_SHARED_SECRET, toml_secret)
    {
        tracing::info!("Shared secret loaded from {}", source);
        return Ok(secret);
    }

    let secret = initialize_shared_secret(db).await?;
    tracing::warn!(
        "No shared secret configured; generated one and stored it in settings key '{}'",
        SHARED_SECRET_KEY
    );
    Ok(secret)
}

// ========================================
// Tests
// ========================================
