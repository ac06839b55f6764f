//! Discovery request and response wire types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::analysis::Recommendation;
use super::evidence::SourceKind;

/// Which facet of an artist's neighbourhood to explore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    SimilarArtists,
    Collaborations,
    Influences,
    #[default]
    Comprehensive,
}

impl DiscoveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryType::SimilarArtists => "similar_artists",
            DiscoveryType::Collaborations => "collaborations",
            DiscoveryType::Influences => "influences",
            DiscoveryType::Comprehensive => "comprehensive",
        }
    }

    /// Secondary sources consulted for this discovery type
    pub fn secondary_sources(&self) -> &'static [SourceKind] {
        match self {
            DiscoveryType::SimilarArtists => &[SourceKind::Registry, SourceKind::Encyclopedia],
            DiscoveryType::Collaborations => &[
                SourceKind::Discography,
                SourceKind::Registry,
                SourceKind::Credits,
            ],
            DiscoveryType::Influences => &[SourceKind::Encyclopedia, SourceKind::Registry],
            DiscoveryType::Comprehensive => &[
                SourceKind::Discography,
                SourceKind::Registry,
                SourceKind::Encyclopedia,
                SourceKind::Credits,
            ],
        }
    }
}

impl fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Body of `POST /discovery/run` and `POST /discovery/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    /// Required; a missing field deserializes as empty and fails validation
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub discovery_type: DiscoveryType,
    #[serde(default = "default_true")]
    pub auto_enhance: bool,
    #[serde(default)]
    pub force_refresh: bool,
}

impl DiscoveryRequest {
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            track_name: None,
            discovery_type: DiscoveryType::default(),
            auto_enhance: true,
            force_refresh: false,
        }
    }

    /// Track name with blank values treated as absent
    pub fn track(&self) -> Option<&str> {
        self.track_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// One `{step, error}` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub step: String,
    pub error: String,
}

impl ErrorLogEntry {
    pub fn new(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            error: error.into(),
        }
    }
}

/// Outcome of one secondary source for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub artist_name: String,
    pub source: SourceKind,
    pub entity_id: Option<Uuid>,
    pub evidence_count: usize,
    pub relationships_created: u32,
    pub relationships_merged: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResults {
    pub steps_completed: Vec<String>,
    pub ai_recommendations: Vec<Recommendation>,
    pub enhancement_results: Vec<EnhancementResult>,
    pub relationships_created: u32,
    pub relationships_merged: u32,
    pub new_artists_discovered: u32,
    pub cache_hit: bool,
    pub error_log: Vec<ErrorLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub success: bool,
    pub results: DiscoveryResults,
    pub summary: String,
    pub next_actions: Vec<String>,
}
