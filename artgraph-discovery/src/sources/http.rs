//! Shared HTTP plumbing for source adapters

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::AdapterError;

/// User-Agent sent to every upstream
pub const USER_AGENT: &str = concat!(
    "artgraph/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/artgraph/artgraph)"
);

/// Longest upstream error body kept in an `AdapterError::Status`
const MAX_ERROR_BODY: usize = 512;

pub fn build_client(timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::Network(format!("failed to build HTTP client: {}", e)))
}

/// Map non-success statuses to adapter errors
pub async fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Auth(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )),
        StatusCode::NOT_FOUND => AdapterError::NotFound(body),
        _ => AdapterError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

/// Check status then decode a JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(AdapterError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| AdapterError::MalformedPayload(e.to_string()))
}

/// Join a base URL and a path without doubling slashes
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
