//! AI reasoning source
//!
//! Talks to a chat-completions style JSON API: one prompt, one answer. The
//! answer is free text expected to contain an analysis object.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::http::{build_client, endpoint, read_json};
use super::pacer::Pacer;
use super::{AdapterError, AnalysisSource};
use crate::config::SourceConfig;
use crate::models::{ArtistAnalysis, DiscoveryType};

const SYSTEM_PROMPT: &str = "You are a music historian. Answer with a single JSON object \
and nothing else.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct AiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_recommendations: usize,
    pacer: Pacer,
}

impl AiClient {
    pub fn new(config: &SourceConfig, api_key: impl Into<String>) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_recommendations: config.max_entities,
            pacer: Pacer::new("ai", config.delay),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, AdapterError> {
        self.pacer.ready().await;

        let response = self
            .http
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0.3,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": prompt},
                ],
            }))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let body: ChatResponse = read_json(response).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AdapterError::MalformedPayload("empty completion".to_string()))
    }
}

/// Prompt for one subject
pub fn build_prompt(
    subject: &str,
    track: Option<&str>,
    discovery_type: DiscoveryType,
    max_recommendations: usize,
) -> String {
    let focus = match discovery_type {
        DiscoveryType::SimilarArtists => "artists with a similar sound or scene",
        DiscoveryType::Collaborations => "artists who collaborated with, produced, or performed with",
        DiscoveryType::Influences => "artists who influenced or were influenced by",
        DiscoveryType::Comprehensive => {
            "related artists of any kind (collaborators, influences, similar artists)"
        }
    };

    let about = match track {
        Some(track) => format!("the artist \"{}\", known for the track \"{}\"", subject, track),
        None => format!("the artist \"{}\"", subject),
    };

    format!(
        "List up to {max} {focus} {about}.\n\
         Respond with JSON of the form:\n\
         {{\"reasoning\": string, \"recommendations\": [{{\"artist_name\": string, \
         \"similarity_score\": number between 0 and 1, \"relationship_type\": one of \
         collaboration|remix|featured|producer|composer|musician|engineer|influence|\
         group_member|label_mate|side_project, \"explanation\": string}}]}}",
        max = max_recommendations,
        focus = focus,
        about = about,
    )
}

#[async_trait]
impl AnalysisSource for AiClient {
    async fn analyze(
        &self,
        subject: &str,
        track: Option<&str>,
        discovery_type: DiscoveryType,
    ) -> Result<ArtistAnalysis, AdapterError> {
        let prompt = build_prompt(subject, track, discovery_type, self.max_recommendations);
        debug!(subject = %subject, "Requesting AI analysis");

        let content = self.complete(&prompt).await?;
        let mut analysis = ArtistAnalysis::from_model_output(&content).map_err(|e| {
            warn!(subject = %subject, "AI answer could not be parsed: {}", e);
            AdapterError::MalformedPayload(e)
        })?;

        analysis.recommendations.truncate(self.max_recommendations);
        Ok(analysis)
    }
}

/// Stand-in when no API key is configured; every call fails with `Auth`
pub struct UnconfiguredAnalysis;

#[async_trait]
impl AnalysisSource for UnconfiguredAnalysis {
    async fn analyze(
        &self,
        _subject: &str,
        _track: Option<&str>,
        _discovery_type: DiscoveryType,
    ) -> Result<ArtistAnalysis, AdapterError> {
        Err(AdapterError::Auth("AI source has no API key configured".to_string()))
    }
}
