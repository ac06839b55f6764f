//! Credit-scraping service source
//!
//! OAuth client-credentials protected. Per fetch: (token refresh when due) →
//! artist search → artist credits. Each credit becomes evidence from the
//! credited person to the artist, labelled with the credited role.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::http::{build_client, endpoint, read_json};
use super::pacer::Pacer;
use super::token::TokenClient;
use super::{cap_entities, AdapterError, SourceAdapter, SourceQuery, SourceReport};
use crate::config::SourceConfig;
use crate::models::{name_key, normalize_name, EntityProfile, Evidence, SourceKind};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Vec<ArtistHit>,
}

#[derive(Debug, Deserialize)]
struct ArtistHit {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    credits: Vec<Credit>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Credit {
    name: String,
    role: String,
    #[serde(default)]
    work: Option<String>,
}

pub struct CreditsClient {
    http: Client,
    base_url: String,
    tokens: TokenClient,
    max_entities: usize,
    pacer: Pacer,
}

impl CreditsClient {
    pub fn new(
        config: &SourceConfig,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let http = build_client(config.timeout)?;
        Ok(Self {
            tokens: TokenClient::new(http.clone(), token_url, client_id, client_secret),
            http,
            base_url: config.base_url.clone(),
            max_entities: config.max_entities,
            pacer: Pacer::new("credits", config.delay),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AdapterError> {
        let token = self.tokens.bearer(&self.pacer).await?;
        self.pacer.ready().await;

        let response = self
            .http
            .get(endpoint(&self.base_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let result = read_json(response).await;
        if let Err(AdapterError::Auth(_)) = &result {
            // Rejected token: the next request fetches a fresh one
            self.tokens.invalidate().await;
        }
        result
    }

    async fn try_fetch(&self, query: &SourceQuery) -> Result<SourceReport, AdapterError> {
        let search: SearchResponse = self
            .get("search", &[("q", query.artist.as_str()), ("type", "artist")])
            .await?;

        let wanted = name_key(&query.artist);
        let hit = search
            .artists
            .iter()
            .find(|a| name_key(&a.name) == wanted)
            .or_else(|| search.artists.first())
            .ok_or_else(|| AdapterError::NotFound(format!("no artist matching '{}'", query.artist)))?;

        let credits: CreditsResponse = self
            .get(&format!("artists/{}/credits", hit.id), &[])
            .await?;

        let artist_name = normalize_name(&hit.name);
        let artist_key = name_key(&artist_name);
        let evidence = credits
            .credits
            .iter()
            .filter(|c| {
                let person = normalize_name(&c.name);
                !person.is_empty() && name_key(&person) != artist_key && !c.role.trim().is_empty()
            })
            .map(|c| {
                let mut e = Evidence::new(
                    SourceKind::Credits,
                    normalize_name(&c.name),
                    artist_name.clone(),
                    c.role.trim(),
                )
                .with_payload(json!({"artist_id": hit.id, "credit": c}));
                if let Some(work) = c.work.as_deref() {
                    e = e.with_context(work.to_string());
                }
                e
            })
            .collect();

        let mut report = SourceReport::empty(SourceKind::Credits);
        report.evidence = cap_entities(evidence, &artist_name, self.max_entities);
        report.profiles.push(EntityProfile {
            external_id: Some(hit.id.clone()),
            ..EntityProfile::new(SourceKind::Credits, artist_name)
        });
        Ok(report)
    }
}

#[async_trait]
impl SourceAdapter for CreditsClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Credits
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        match self.try_fetch(query).await {
            Ok(report) => {
                debug!(
                    source = "credits",
                    artist = %query.artist,
                    evidence = report.evidence.len(),
                    "Credits lookup complete"
                );
                report
            }
            Err(e) => {
                warn!(source = "credits", artist = %query.artist, "Credits lookup failed: {}", e);
                SourceReport::failed(SourceKind::Credits, e)
            }
        }
    }
}
