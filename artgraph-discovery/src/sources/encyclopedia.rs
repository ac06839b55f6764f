//! Encyclopedia full-text search source (MediaWiki-style API)
//!
//! Needs the pair (candidate, request subject). The intro extract of the
//! candidate's article becomes a profile bio; a full-text search for both names
//! together is classified by keywords into at most one relation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::http::{build_client, read_json};
use super::pacer::Pacer;
use super::{AdapterError, SourceAdapter, SourceQuery, SourceReport};
use crate::config::SourceConfig;
use crate::models::{EntityProfile, Evidence, SourceKind};

/// Longest bio kept from an intro extract, in characters
const MAX_BIO_CHARS: usize = 1500;

/// Keyword → relation label, most specific first
const KEYWORDS: &[(&str, &str)] = &[
    ("remix", "remix"),
    ("featuring", "featured"),
    ("feat.", "featured"),
    ("produced by", "producer"),
    ("producer", "producer"),
    ("side project", "side project"),
    ("member of", "member"),
    ("founding member", "member"),
    ("joined", "member"),
    ("influenced", "influence"),
    ("influence", "influence"),
    ("inspired", "influence"),
    ("collaborat", "collaboration"),
    ("worked with", "collaboration"),
    ("recorded with", "collaboration"),
    ("duet", "collaboration"),
    ("labelmate", "label mate"),
    ("label mate", "label mate"),
];

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct QueryResponse<T> {
    #[serde(default)]
    query: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    pageid: Option<u64>,
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

pub struct EncyclopediaClient {
    http: Client,
    api_url: String,
    pacer: Pacer,
}

impl EncyclopediaClient {
    pub fn new(config: &SourceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            api_url: config.base_url.clone(),
            pacer: Pacer::new("encyclopedia", config.delay),
        })
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, AdapterError> {
        self.pacer.ready().await;

        let response = self
            .http
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let body: QueryResponse<T> = read_json(response).await?;
        Ok(body.query)
    }

    async fn intro_profile(&self, artist: &str) -> Result<Option<EntityProfile>, AdapterError> {
        let pages: Option<PagesQuery> = self
            .query(&[
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", artist),
            ])
            .await?;

        let page = pages
            .into_iter()
            .flat_map(|p| p.pages.into_values())
            .find(|page| page.missing.is_none() && page.pageid.is_some());

        Ok(page.and_then(|page| {
            let extract = page.extract?.trim().to_string();
            if extract.is_empty() {
                return None;
            }
            Some(EntityProfile {
                bio: Some(extract.chars().take(MAX_BIO_CHARS).collect()),
                external_id: page.pageid.map(|id| id.to_string()),
                ..EntityProfile::new(SourceKind::Encyclopedia, artist)
            })
        }))
    }

    async fn pair_evidence(
        &self,
        candidate: &str,
        subject: &str,
    ) -> Result<Option<Evidence>, AdapterError> {
        let search_term = format!("\"{}\" \"{}\"", candidate, subject);
        let results: Option<SearchQuery> = self
            .query(&[("list", "search"), ("srsearch", &search_term), ("srlimit", "5")])
            .await?;

        let hits = results.map(|r| r.search).unwrap_or_default();
        for hit in &hits {
            let text = strip_markup(&hit.snippet);
            if let Some(label) = classify(&text) {
                return Ok(Some(
                    Evidence::new(SourceKind::Encyclopedia, candidate, subject, label)
                        .with_context(text.clone())
                        .with_payload(json!({
                            "title": hit.title,
                            "snippet": text,
                        })),
                ));
            }
        }

        debug!(candidate = %candidate, subject = %subject, hits = hits.len(), "No classifiable co-mention");
        Ok(None)
    }

    async fn try_fetch(&self, query: &SourceQuery) -> Result<SourceReport, AdapterError> {
        let mut report = SourceReport::empty(SourceKind::Encyclopedia);

        if let Some(profile) = self.intro_profile(&query.artist).await? {
            report.profiles.push(profile);
        }

        if let Some(subject) = query.related_to.as_deref() {
            if let Some(evidence) = self.pair_evidence(&query.artist, subject).await? {
                report.evidence.push(evidence);
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl SourceAdapter for EncyclopediaClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Encyclopedia
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        match self.try_fetch(query).await {
            Ok(report) => report,
            Err(e) => {
                warn!(source = "encyclopedia", artist = %query.artist, "Encyclopedia lookup failed: {}", e);
                SourceReport::failed(SourceKind::Encyclopedia, e)
            }
        }
    }
}

/// Remove HTML tags and decode the few entities search snippets use
pub fn strip_markup(snippet: &str) -> String {
    let mut text = String::with_capacity(snippet.len());
    let mut in_tag = false;
    for c in snippet.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First matching relation label for a snippet
pub fn classify(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, label)| *label)
}
