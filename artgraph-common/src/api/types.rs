//! Shared API response types

use serde::Serialize;

/// Error body returned with 401 Unauthorized
///
/// # Examples
///
/// ```
/// use artgraph_common::api::types::AuthErrorResponse;
///
/// let error = AuthErrorResponse::new("invalid_token", "Invalid bearer token");
/// assert_eq!(error.error, "invalid_token");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AuthErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl AuthErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::api::auth::ApiAuthError> for AuthErrorResponse {
    fn from(err: &crate::api::auth::ApiAuthError) -> Self {
        use crate::api::auth::ApiAuthError;

        let code = match err {
            ApiAuthError::MissingToken => "missing_token",
            ApiAuthError::MalformedHeader => "malformed_header",
            ApiAuthError::InvalidToken => "invalid_token",
            ApiAuthError::DatabaseError(_) => "auth_unavailable",
        };
        Self::new(code, err.to_string())
    }
}
