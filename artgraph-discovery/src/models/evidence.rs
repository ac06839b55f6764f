//! Source kinds and evidence

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// External knowledge source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// AI reasoning service
    Ai,
    /// Discography/credits database
    Discography,
    /// Metadata-relation registry
    Registry,
    /// Encyclopedia full-text search
    Encyclopedia,
    /// Credit-scraping service
    Credits,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Ai,
        SourceKind::Discography,
        SourceKind::Registry,
        SourceKind::Encyclopedia,
        SourceKind::Credits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ai => "ai",
            SourceKind::Discography => "discography",
            SourceKind::Registry => "registry",
            SourceKind::Encyclopedia => "encyclopedia",
            SourceKind::Credits => "credits",
        }
    }

    /// Rank used when deciding whether an incoming bio may replace the current one
    ///
    /// Higher wins: encyclopedia > discography > registry > credits > ai.
    pub fn bio_trust(&self) -> u8 {
        match self {
            SourceKind::Encyclopedia => 5,
            SourceKind::Discography => 4,
            SourceKind::Registry => 3,
            SourceKind::Credits => 2,
            SourceKind::Ai => 1,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown source kind: {}", s))
    }
}

/// One normalized fact from one adapter call
///
/// Never persisted as-is: the fuser consumes it and keeps only its hash and raw
/// payload as provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: SourceKind,
    /// Name of the relationship's source side (e.g. the credited person)
    pub subject_name: String,
    /// Name of the relationship's target side (e.g. the credited artist)
    pub target_name: String,
    /// Source-specific relation vocabulary, decoded by the fuser
    pub relation_label: String,
    /// Source-specific strength signal (AI similarity score)
    pub strength_hint: Option<f64>,
    /// Free-text context (release title, snippet, ...)
    pub context: Option<String>,
    pub raw_payload: serde_json::Value,
}

impl Evidence {
    pub fn new(
        source: SourceKind,
        subject_name: impl Into<String>,
        target_name: impl Into<String>,
        relation_label: impl Into<String>,
    ) -> Self {
        Self {
            source,
            subject_name: subject_name.into(),
            target_name: target_name.into(),
            relation_label: relation_label.into(),
            strength_hint: None,
            context: None,
            raw_payload: serde_json::Value::Null,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_strength_hint(mut self, hint: f64) -> Self {
        self.strength_hint = Some(hint);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.raw_payload = payload;
        self
    }

    /// SHA-256 over source, names, label and raw payload (hex)
    ///
    /// Byte-identical evidence hashes identically, so replaying it is detectable.
    pub fn evidence_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.source.as_str(),
            self.subject_name.as_str(),
            self.target_name.as_str(),
            self.relation_label.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.raw_payload.to_string().as_bytes());

        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
