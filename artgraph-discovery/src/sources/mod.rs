//! Source adapters
//!
//! One adapter per external knowledge source. Every adapter:
//! - decodes its upstream's vocabulary into [`Evidence`] at this boundary
//! - paces its own calls (see [`pacer`])
//! - caps the secondary entities it reports per call
//! - never fails past [`SourceAdapter::fetch`]: errors travel inside the report
//!
//! The AI service has its own trait, [`AnalysisSource`], because it produces an
//! analysis rather than evidence.

pub mod ai;
pub mod credits;
pub mod discography;
pub mod encyclopedia;
pub mod http;
pub mod pacer;
pub mod registry;
pub mod token;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::models::{
    name_key, ArtistAnalysis, DiscoveryType, EntityProfile, Evidence, SourceKind,
};

/// Adapter failure, recorded in the report rather than raised
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("call budget of {limit} exhausted for this request")]
    BudgetExhausted { limit: usize },
}

impl AdapterError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_decode() {
            AdapterError::MalformedPayload(err.to_string())
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

/// What to look up
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    /// The artist to look up (a recommended candidate)
    pub artist: String,
    /// The request's subject artist, for sources that search for the pair
    pub related_to: Option<String>,
}

impl SourceQuery {
    pub fn new(artist: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            related_to: None,
        }
    }

    pub fn related_to(mut self, subject: impl Into<String>) -> Self {
        self.related_to = Some(subject.into());
        self
    }
}

/// Result of one adapter invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: SourceKind,
    pub evidence: Vec<Evidence>,
    pub profiles: Vec<EntityProfile>,
    pub error: Option<AdapterError>,
}

impl SourceReport {
    pub fn empty(source: SourceKind) -> Self {
        Self {
            source,
            evidence: Vec::new(),
            profiles: Vec::new(),
            error: None,
        }
    }

    pub fn failed(source: SourceKind, error: AdapterError) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(source)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Profile whose name matches (case-insensitively)
    pub fn profile_for(&self, name: &str) -> Option<&EntityProfile> {
        let key = name_key(name);
        self.profiles.iter().find(|p| name_key(&p.name) == key)
    }
}

/// A secondary knowledge source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Whether this source is consulted for a discovery type
    fn supports(&self, discovery_type: DiscoveryType) -> bool {
        discovery_type.secondary_sources().contains(&self.kind())
    }

    /// Look up one artist; failures are reported in `SourceReport::error`
    async fn fetch(&self, query: &SourceQuery) -> SourceReport;
}

/// The AI reasoning source
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn analyze(
        &self,
        subject: &str,
        track: Option<&str>,
        discovery_type: DiscoveryType,
    ) -> Result<ArtistAnalysis, AdapterError>;
}

/// Per-request ceiling on calls to one adapter
///
/// Wraps a shared adapter for the lifetime of one request; once the budget is
/// spent further fetches short-circuit with `BudgetExhausted`.
pub struct BudgetedAdapter {
    inner: Arc<dyn SourceAdapter>,
    limit: usize,
    used: AtomicUsize,
}

impl BudgetedAdapter {
    pub fn new(inner: Arc<dyn SourceAdapter>, limit: usize) -> Self {
        Self {
            inner,
            limit,
            used: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    pub fn calls_made(&self) -> usize {
        self.used.load(Ordering::SeqCst).min(self.limit)
    }

    pub async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        let previous = self.used.fetch_add(1, Ordering::SeqCst);
        if previous >= self.limit {
            return SourceReport::failed(
                self.inner.kind(),
                AdapterError::BudgetExhausted { limit: self.limit },
            );
        }
        self.inner.fetch(query).await
    }
}

/// Keep evidence mentioning at most `max_entities` distinct secondary names
///
/// `anchor` is the artist the adapter was asked about; the secondary name of a
/// piece of evidence is whichever side is not the anchor.
pub fn cap_entities(evidence: Vec<Evidence>, anchor: &str, max_entities: usize) -> Vec<Evidence> {
    let anchor_key = name_key(anchor);
    let mut admitted: HashSet<String> = HashSet::new();

    evidence
        .into_iter()
        .filter(|e| {
            let subject_key = name_key(&e.subject_name);
            let other = if subject_key == anchor_key {
                name_key(&e.target_name)
            } else {
                subject_key
            };
            if admitted.contains(&other) {
                return true;
            }
            if admitted.len() < max_entities {
                admitted.insert(other);
                return true;
            }
            false
        })
        .collect()
}

/// Adapters built from configuration
pub struct SourceSet {
    pub ai: Arc<dyn AnalysisSource>,
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
}

/// Build every usable source; unusable ones are skipped with a warning
///
/// Without a usable AI source every run takes the fallback path.
pub fn build_sources(config: &DiscoveryConfig) -> SourceSet {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    let mut ai: Option<Arc<dyn AnalysisSource>> = None;

    for kind in SourceKind::ALL {
        let source = config.source(kind);
        if !source.is_usable() {
            continue;
        }

        let built = match kind {
            SourceKind::Ai => {
                ai::AiClient::new(&source, source.api_key.clone().unwrap_or_default())
                    .map(|c| ai = Some(Arc::new(c) as Arc<dyn AnalysisSource>))
            }
            SourceKind::Discography => discography::DiscographyClient::new(
                &source,
                source.api_key.clone().unwrap_or_default(),
            )
            .map(|c| adapters.push(Arc::new(c))),
            SourceKind::Registry => {
                registry::RegistryClient::new(&source).map(|c| adapters.push(Arc::new(c)))
            }
            SourceKind::Encyclopedia => {
                encyclopedia::EncyclopediaClient::new(&source).map(|c| adapters.push(Arc::new(c)))
            }
            SourceKind::Credits => credits::CreditsClient::new(
                &source,
                source.token_url.clone().unwrap_or_default(),
                source.client_id.clone().unwrap_or_default(),
                source.client_secret.clone().unwrap_or_default(),
            )
            .map(|c| adapters.push(Arc::new(c))),
        };

        match built {
            Ok(()) => info!(source = %kind, base_url = %source.base_url, "Source enabled"),
            Err(e) => warn!(source = %kind, "Source disabled: {}", e),
        }
    }

    let ai = ai.unwrap_or_else(|| {
        warn!("No AI source configured; discovery runs will use the fallback analysis");
        Arc::new(ai::UnconfiguredAnalysis)
    });

    SourceSet { ai, adapters }
}
