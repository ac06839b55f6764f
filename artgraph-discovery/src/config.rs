//! Configuration resolution for artgraph-discovery
//!
//! Per-source settings come from the TOML `[sources.<kind>]` sections over
//! compiled defaults. Credentials resolve Database → ENV → TOML.

use artgraph_common::config::{resolve_layered, PipelineSettings, SourceSettings, TomlConfig};
use artgraph_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::SourceKind;

/// Environment variable overriding the bind address
pub const ENV_BIND: &str = "ARTGRAPH_BIND";

/// Resolved settings for one source adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub enabled: bool,
    pub base_url: String,
    /// Minimum spacing between upstream calls
    pub delay: Duration,
    pub timeout: Duration,
    /// Ceiling on secondary entities reported per fetch
    pub max_entities: usize,
    /// AI API key or discography token
    pub api_key: Option<String>,
    pub model: String,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Release detail lookups per discography fetch
    pub release_detail_limit: usize,
}

impl SourceConfig {
    /// Compiled defaults for a source
    pub fn defaults(kind: SourceKind) -> Self {
        let (base_url, delay_ms, timeout_secs) = match kind {
            SourceKind::Ai => ("https://api.openai.com/v1", 250, 120),
            SourceKind::Discography => ("https://api.discogs.com", 1000, 30),
            SourceKind::Registry => ("https://musicbrainz.org/ws/2", 1000, 30),
            SourceKind::Encyclopedia => ("https://en.wikipedia.org/w/api.php", 200, 30),
            // No public default: the credit service must be configured explicitly
            SourceKind::Credits => ("", 300, 30),
        };

        Self {
            kind,
            enabled: true,
            base_url: base_url.to_string(),
            delay: Duration::from_millis(delay_ms),
            timeout: Duration::from_secs(timeout_secs),
            max_entities: 10,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            token_url: None,
            client_id: None,
            client_secret: None,
            release_detail_limit: 3,
        }
    }

    /// Overlay a TOML section on these settings
    pub fn with_settings(mut self, settings: &SourceSettings) -> Self {
        if let Some(enabled) = settings.enabled {
            self.enabled = enabled;
        }
        if let Some(base_url) = &settings.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(delay_ms) = settings.delay_ms {
            self.delay = Duration::from_millis(delay_ms);
        }
        if let Some(timeout_secs) = settings.timeout_secs {
            self.timeout = Duration::from_secs(timeout_secs);
        }
        if let Some(max_entities) = settings.max_entities {
            self.max_entities = max_entities;
        }
        if let Some(model) = &settings.model {
            self.model = model.clone();
        }
        if let Some(token_url) = &settings.token_url {
            self.token_url = Some(token_url.clone());
        }
        if let Some(limit) = settings.release_detail_limit {
            self.release_detail_limit = limit;
        }
        self
    }

    /// Point the source at another upstream (tests, mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Why this source cannot run, if it cannot
    pub fn missing_requirement(&self) -> Option<&'static str> {
        if self.base_url.trim().is_empty() {
            return Some("base_url");
        }
        match self.kind {
            SourceKind::Ai | SourceKind::Discography if self.api_key.is_none() => Some("api key"),
            SourceKind::Credits if self.token_url.is_none() => Some("token_url"),
            SourceKind::Credits if self.client_id.is_none() || self.client_secret.is_none() => {
                Some("client credentials")
            }
            _ => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.enabled && self.missing_requirement().is_none()
    }
}

/// Credential slot: settings key, environment variable
struct CredentialSlot {
    settings_key: &'static str,
    env_var: &'static str,
}

const AI_API_KEY: CredentialSlot = CredentialSlot {
    settings_key: "ai_api_key",
    env_var: "ARTGRAPH_AI_API_KEY",
};
const DISCOGS_TOKEN: CredentialSlot = CredentialSlot {
    settings_key: "discogs_token",
    env_var: "ARTGRAPH_DISCOGS_TOKEN",
};
const CREDITS_CLIENT_ID: CredentialSlot = CredentialSlot {
    settings_key: "credits_client_id",
    env_var: "ARTGRAPH_CREDITS_CLIENT_ID",
};
const CREDITS_CLIENT_SECRET: CredentialSlot = CredentialSlot {
    settings_key: "credits_client_secret",
    env_var: "ARTGRAPH_CREDITS_CLIENT_SECRET",
};

/// Pipeline knobs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Candidates fanned out per request; also each adapter's call budget
    pub max_candidates: usize,
    /// Candidates processed concurrently (1 = sequential)
    pub fanout_concurrency: usize,
    /// Membership edges fused per adapter result
    pub max_members_per_result: usize,
    pub cache_window: chrono::Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            fanout_concurrency: 1,
            max_members_per_result: 5,
            cache_window: chrono::Duration::hours(24),
        }
    }
}

impl PipelineConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let defaults = Self::default();
        Self {
            max_candidates: settings.max_candidates.unwrap_or(defaults.max_candidates),
            fanout_concurrency: settings
                .fanout_concurrency
                .unwrap_or(defaults.fanout_concurrency)
                .max(1),
            max_members_per_result: settings
                .max_members_per_result
                .unwrap_or(defaults.max_members_per_result),
            cache_window: settings
                .cache_window_hours
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.cache_window),
        }
    }
}

/// Everything the discovery service needs beyond the database
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    pub sources: BTreeMap<SourceKind, SourceConfig>,
    pub pipeline: PipelineConfig,
}

impl DiscoveryConfig {
    /// Merge TOML over defaults and resolve credentials
    pub async fn resolve(db: &SqlitePool, toml: &TomlConfig) -> Result<Self> {
        let mut sources = BTreeMap::new();

        for kind in SourceKind::ALL {
            let settings = toml.source(kind.as_str());
            let mut config = SourceConfig::defaults(kind).with_settings(&settings);

            match kind {
                SourceKind::Ai => {
                    config.api_key =
                        resolve_credential(db, &AI_API_KEY, settings.api_key.as_ref()).await?;
                }
                SourceKind::Discography => {
                    config.api_key =
                        resolve_credential(db, &DISCOGS_TOKEN, settings.api_key.as_ref()).await?;
                }
                SourceKind::Credits => {
                    config.client_id =
                        resolve_credential(db, &CREDITS_CLIENT_ID, settings.client_id.as_ref())
                            .await?;
                    config.client_secret = resolve_credential(
                        db,
                        &CREDITS_CLIENT_SECRET,
                        settings.client_secret.as_ref(),
                    )
                    .await?;
                }
                SourceKind::Registry | SourceKind::Encyclopedia => {}
            }

            if !config.enabled {
                info!(source = %kind, "Source disabled by configuration");
            } else if let Some(missing) = config.missing_requirement() {
                warn!(source = %kind, "Source disabled: no {} configured", missing);
            }

            sources.insert(kind, config);
        }

        Ok(Self {
            sources,
            pipeline: PipelineConfig::from_settings(&toml.pipeline),
        })
    }

    pub fn source(&self, kind: SourceKind) -> SourceConfig {
        self.sources
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| SourceConfig::defaults(kind))
    }
}

/// Read one value from the settings table
pub async fn load_setting(db: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;
    Ok(value.flatten())
}

async fn resolve_credential(
    db: &SqlitePool,
    slot: &CredentialSlot,
    toml_value: Option<&String>,
) -> Result<Option<String>> {
    let db_value = load_setting(db, slot.settings_key).await?;

    Ok(resolve_layered(db_value, slot.env_var, toml_value).map(|(value, tier)| {
        info!("Credential '{}' loaded from {}", slot.settings_key, tier);
        value
    }))
}

/// Bind address: CLI → ENV → TOML → compiled default
pub fn resolve_bind_address(cli: Option<String>, toml: &TomlConfig) -> String {
    cli.or_else(|| std::env::var(ENV_BIND).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| toml.bind_address.clone())
        .unwrap_or_else(|| {
            artgraph_common::config::CompiledDefaults::for_current_platform().bind_address
        })
}
