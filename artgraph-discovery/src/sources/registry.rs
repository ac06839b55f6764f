//! Metadata-relation registry source (MusicBrainz-style web service)
//!
//! Two calls per fetch: artist search, then artist lookup with artist-artist
//! relations and tags. Relation direction decides which side is the subject:
//! `forward` reads "this artist → related", `backward` the reverse.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::http::{build_client, endpoint, read_json};
use super::pacer::Pacer;
use super::{cap_entities, AdapterError, SourceAdapter, SourceQuery, SourceReport};
use crate::config::SourceConfig;
use crate::models::{name_key, EntityProfile, Evidence, SourceKind};

/// Tags kept as genres on the profile
const MAX_GENRES: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Vec<ArtistHit>,
}

#[derive(Debug, Deserialize)]
struct ArtistHit {
    id: String,
    name: String,
    #[serde(default)]
    score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArtistLookup {
    id: String,
    name: String,
    #[serde(default)]
    disambiguation: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    artist: Option<RelatedArtist>,
}

#[derive(Debug, Deserialize)]
struct RelatedArtist {
    id: String,
    name: String,
}

pub struct RegistryClient {
    http: Client,
    base_url: String,
    max_entities: usize,
    pacer: Pacer,
}

impl RegistryClient {
    pub fn new(config: &SourceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            base_url: config.base_url.clone(),
            max_entities: config.max_entities,
            pacer: Pacer::new("registry", config.delay),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AdapterError> {
        self.pacer.ready().await;

        let response = self
            .http
            .get(endpoint(&self.base_url, path))
            .header("Accept", "application/json")
            .query(query)
            .query(&[("fmt", "json")])
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        read_json(response).await
    }

    async fn find_artist(&self, artist: &str) -> Result<ArtistHit, AdapterError> {
        let escaped = artist.replace('"', "\\\"");
        let search: SearchResponse = self
            .get(
                "artist",
                &[
                    ("query", format!("artist:\"{}\"", escaped)),
                    ("limit", "5".to_string()),
                ],
            )
            .await?;

        let wanted = name_key(artist);
        let mut hits = search.artists;
        let exact = hits.iter().position(|h| name_key(&h.name) == wanted);
        match exact {
            Some(index) => Ok(hits.swap_remove(index)),
            None => hits
                .into_iter()
                .max_by_key(|h| h.score.unwrap_or(0))
                .ok_or_else(|| AdapterError::NotFound(format!("no artist matching '{}'", artist))),
        }
    }

    async fn try_fetch(&self, query: &SourceQuery) -> Result<SourceReport, AdapterError> {
        let hit = self.find_artist(&query.artist).await?;
        let lookup: ArtistLookup = self
            .get(
                &format!("artist/{}", hit.id),
                &[("inc", "artist-rels+tags".to_string())],
            )
            .await?;

        let mut report = SourceReport::empty(SourceKind::Registry);
        let evidence = relation_evidence(&lookup);
        report.evidence = cap_entities(evidence, &lookup.name, self.max_entities);

        let mut tags = lookup.tags;
        tags.sort_by(|a, b| b.count.cmp(&a.count));
        report.profiles.push(EntityProfile {
            genres: tags.into_iter().take(MAX_GENRES).map(|t| t.name).collect(),
            external_id: Some(lookup.id.clone()),
            ..EntityProfile::new(SourceKind::Registry, lookup.name.clone())
        });

        Ok(report)
    }
}

#[async_trait]
impl SourceAdapter for RegistryClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        match self.try_fetch(query).await {
            Ok(report) => {
                debug!(
                    source = "registry",
                    artist = %query.artist,
                    evidence = report.evidence.len(),
                    "Registry lookup complete"
                );
                report
            }
            Err(e) => {
                warn!(source = "registry", artist = %query.artist, "Registry lookup failed: {}", e);
                SourceReport::failed(SourceKind::Registry, e)
            }
        }
    }
}

fn relation_evidence(lookup: &ArtistLookup) -> Vec<Evidence> {
    lookup
        .relations
        .iter()
        .filter_map(|relation| {
            let related = relation.artist.as_ref()?;
            let backward = relation.direction.as_deref() == Some("backward");
            let (subject, target) = if backward {
                (related.name.as_str(), lookup.name.as_str())
            } else {
                (lookup.name.as_str(), related.name.as_str())
            };

            let mut evidence = Evidence::new(
                SourceKind::Registry,
                subject,
                target,
                relation.relation_type.clone(),
            )
            .with_payload(json!({
                "artist_id": lookup.id,
                "related_id": related.id,
                "type": relation.relation_type,
                "direction": relation.direction,
                "attributes": relation.attributes,
            }));
            if let Some(disambiguation) = lookup.disambiguation.as_deref().filter(|d| !d.is_empty()) {
                evidence = evidence.with_context(disambiguation.to_string());
            }
            Some(evidence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(relations: Vec<Relation>) -> ArtistLookup {
        ArtistLookup {
            id: "mbid-1".into(),
            name: "The Band".into(),
            disambiguation: None,
            tags: vec![],
            relations,
        }
    }

    #[test]
    fn test_direction_decides_subject() {
        let evidence = relation_evidence(&lookup(vec![
            Relation {
                relation_type: "member of band".into(),
                direction: Some("backward".into()),
                attributes: vec!["drums".into()],
                artist: Some(RelatedArtist { id: "p".into(), name: "Drummer".into() }),
            },
            Relation {
                relation_type: "collaboration".into(),
                direction: Some("forward".into()),
                attributes: vec![],
                artist: Some(RelatedArtist { id: "q".into(), name: "Other Band".into() }),
            },
        ]));

        assert_eq!(evidence[0].subject_name, "Drummer");
        assert_eq!(evidence[0].target_name, "The Band");
        assert_eq!(evidence[1].subject_name, "The Band");
        assert_eq!(evidence[1].target_name, "Other Band");
    }

    #[test]
    fn test_non_artist_relations_ignored() {
        let evidence = relation_evidence(&lookup(vec![Relation {
            relation_type: "wikipedia".into(),
            direction: Some("forward".into()),
            attributes: vec![],
            artist: None,
        }]));
        assert!(evidence.is_empty());
    }
}
