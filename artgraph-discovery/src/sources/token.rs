//! OAuth client-credentials token cache
//!
//! Each client owns its own `{token, expires_at}`; there is no process-global
//! token state. A token is refreshed when it is within [`REFRESH_MARGIN_SECS`]
//! of expiry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::http::read_json;
use super::pacer::Pacer;
use super::AdapterError;

pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable at `now` without refreshing
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > ChronoDuration::seconds(REFRESH_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct TokenClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenClient {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a new one when missing or near expiry
    ///
    /// The lock is held across the refresh so concurrent callers trigger one
    /// token request, not several.
    pub async fn bearer(&self, pacer: &Pacer) -> Result<String, AdapterError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        debug!("Refreshing client-credentials token");
        pacer.ready().await;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let body: TokenResponse = read_json(response).await.map_err(|e| match e {
            AdapterError::Status { status, body } if status == 400 => {
                AdapterError::Auth(format!("token request rejected: {}", body))
            }
            other => other,
        })?;

        let lifetime = body.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        let token = AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        };
        let value = token.token.clone();
        *cached = Some(token);

        Ok(value)
    }

    /// Drop the cached token (after the upstream rejects it)
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
