//! AI analysis payload
//!
//! The AI service answers in free text that is supposed to contain a JSON
//! object. [`ArtistAnalysis::from_model_output`] digs that object out of code
//! fences and surrounding prose.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::entity::{name_key, normalize_name};

/// Reasoning text placed in the substitute analysis after an AI failure
pub const FALLBACK_REASONING: &str = "fallback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistAnalysis {
    #[serde(default)]
    pub reasoning: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(alias = "name", alias = "artist")]
    pub artist_name: String,
    #[serde(
        default,
        alias = "similarity",
        alias = "score",
        deserialize_with = "lenient_score"
    )]
    pub similarity_score: f64,
    #[serde(default = "default_relationship_type", alias = "relationship", alias = "type")]
    pub relationship_type: String,
    #[serde(default, alias = "reason")]
    pub explanation: String,
}

fn default_relationship_type() -> String {
    "similar".to_string()
}

/// Score as a number, a numeric string, or null (0.0)
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Score {
        Number(f64),
        Text(String),
    }

    match Option::<Score>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Score::Number(n)) => Ok(n),
        Some(Score::Text(text)) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Model answer before per-item validation
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    reasoning: Option<String>,
    recommendations: Vec<serde_json::Value>,
}

impl ArtistAnalysis {
    /// Substitute analysis used when the AI step fails
    pub fn fallback() -> Self {
        Self {
            reasoning: FALLBACK_REASONING.to_string(),
            recommendations: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.reasoning == FALLBACK_REASONING && self.recommendations.is_empty()
    }

    /// Parse model output: bare JSON, fenced JSON, or JSON embedded in prose
    ///
    /// Recommendations that do not decode are dropped individually, as are
    /// blank names; duplicates (by case-insensitive name) keep their first
    /// occurrence.
    pub fn from_model_output(text: &str) -> Result<Self, String> {
        let stripped = strip_code_fences(text);

        let raw: RawAnalysis = match serde_json::from_str(stripped.trim()) {
            Ok(raw) => raw,
            Err(_) => {
                // Fences sharing a line with the object leave nothing after stripping
                let object = extract_json_object(&stripped)
                    .or_else(|| extract_json_object(text))
                    .ok_or_else(|| "no JSON object in model output".to_string())?;
                serde_json::from_str(object)
                    .map_err(|e| format!("model output is not an analysis object: {}", e))?
            }
        };

        let mut seen = HashSet::new();
        let recommendations = raw
            .recommendations
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Recommendation>(item) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    debug!("Dropping unreadable recommendation: {}", e);
                    None
                }
            })
            .filter_map(|mut rec| {
                rec.artist_name = normalize_name(&rec.artist_name);
                (!rec.artist_name.is_empty() && seen.insert(name_key(&rec.artist_name)))
                    .then_some(rec)
            })
            .collect();

        Ok(Self {
            reasoning: raw.reasoning.unwrap_or_default(),
            recommendations,
        })
    }
}

/// Remove markdown fence lines (```json ... ```), keeping their contents
fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outermost balanced `{...}` starting at the first `{`, string-literal aware
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
