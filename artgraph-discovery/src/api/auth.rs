//! Bearer-token authentication middleware
//!
//! Applied to every route except `/health`.

use artgraph_common::api::{authorize, AuthErrorResponse};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::AppState;

/// Reject requests whose `Authorization: Bearer` token is not the shared secret
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match authorize(header, &state.shared_secret) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(path = %request.uri().path(), "Rejected request: {}", e);
            (StatusCode::UNAUTHORIZED, Json(AuthErrorResponse::from(&e))).into_response()
        }
    }
}
