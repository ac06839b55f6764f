//! Discography/credits database source (Discogs-style API)
//!
//! Per fetch: artist search → artist detail (members, groups, profile) →
//! release list → up to `release_detail_limit` release details. Every release
//! and track credit becomes one piece of evidence (credited person → artist),
//! so two tracks produced by the same person yield two distinct pieces.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::http::{build_client, endpoint, read_json};
use super::pacer::Pacer;
use super::{cap_entities, AdapterError, SourceAdapter, SourceQuery, SourceReport};
use crate::config::SourceConfig;
use crate::models::{name_key, normalize_name, EntityProfile, Evidence, SourceKind};

/// Relation label used for band membership edges
pub const MEMBER_LABEL: &str = "member";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ArtistDetail {
    id: u64,
    name: String,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    namevariations: Vec<String>,
    #[serde(default)]
    members: Vec<ArtistRef>,
    #[serde(default)]
    groups: Vec<ArtistRef>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    #[serde(default)]
    releases: Vec<ReleaseSummary>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSummary {
    id: u64,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    main_release: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDetail {
    id: u64,
    title: String,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    #[serde(default)]
    extraartists: Vec<Credit>,
    #[serde(default)]
    tracklist: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extraartists: Vec<Credit>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Credit {
    name: String,
    #[serde(default)]
    role: String,
}

pub struct DiscographyClient {
    http: Client,
    base_url: String,
    token: String,
    max_entities: usize,
    release_detail_limit: usize,
    pacer: Pacer,
}

impl DiscographyClient {
    pub fn new(config: &SourceConfig, token: impl Into<String>) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            base_url: config.base_url.clone(),
            token: token.into(),
            max_entities: config.max_entities,
            release_detail_limit: config.release_detail_limit,
            pacer: Pacer::new("discography", config.delay),
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
            .header("Authorization", format!("Discogs token={}", self.token))
            .query(query)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        read_json(response).await
    }

    async fn find_artist_id(&self, artist: &str) -> Result<u64, AdapterError> {
        let search: SearchResponse = self
            .get(
                "database/search",
                &[
                    ("q", artist.to_string()),
                    ("type", "artist".to_string()),
                    ("per_page", "5".to_string()),
                ],
            )
            .await?;

        let wanted = name_key(artist);
        search
            .results
            .iter()
            .find(|r| name_key(&clean_name(&r.title)) == wanted)
            .or_else(|| search.results.first())
            .map(|r| r.id)
            .ok_or_else(|| AdapterError::NotFound(format!("no artist matching '{}'", artist)))
    }

    async fn try_fetch(&self, query: &SourceQuery) -> Result<SourceReport, AdapterError> {
        let artist_id = self.find_artist_id(&query.artist).await?;
        let artist: ArtistDetail = self.get(&format!("artists/{}", artist_id), &[]).await?;
        let artist_name = clean_name(&artist.name);

        let mut report = SourceReport::empty(SourceKind::Discography);
        let mut evidence = membership_evidence(&artist_name, &artist);

        let releases: ReleasesResponse = self
            .get(
                &format!("artists/{}/releases", artist_id),
                &[
                    ("sort", "year".to_string()),
                    ("sort_order", "desc".to_string()),
                    ("per_page", (self.release_detail_limit * 2).max(1).to_string()),
                ],
            )
            .await?;

        let mut genres = BTreeSet::new();
        for release_id in release_ids(&releases.releases, self.release_detail_limit) {
            match self
                .get::<ReleaseDetail>(&format!("releases/{}", release_id), &[])
                .await
            {
                Ok(release) => {
                    genres.extend(release.genres.iter().cloned());
                    genres.extend(release.styles.iter().cloned());
                    evidence.extend(credit_evidence(&artist_name, &release));
                }
                Err(e) => {
                    warn!(source = "discography", release_id, "Release lookup failed: {}", e);
                }
            }
        }

        report.evidence = cap_entities(evidence, &artist_name, self.max_entities);
        report.profiles.push(EntityProfile {
            bio: artist.profile.filter(|p| !p.trim().is_empty()),
            genres: genres.into_iter().collect(),
            aliases: artist.namevariations.iter().map(|n| clean_name(n)).collect(),
            external_id: Some(artist.id.to_string()),
            ..EntityProfile::new(SourceKind::Discography, artist_name)
        });

        Ok(report)
    }
}

#[async_trait]
impl SourceAdapter for DiscographyClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Discography
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        match self.try_fetch(query).await {
            Ok(report) => {
                debug!(
                    source = "discography",
                    artist = %query.artist,
                    evidence = report.evidence.len(),
                    "Discography lookup complete"
                );
                report
            }
            Err(e) => {
                warn!(source = "discography", artist = %query.artist, "Discography lookup failed: {}", e);
                SourceReport::failed(SourceKind::Discography, e)
            }
        }
    }
}

/// Strip the numeric disambiguation suffix ("John Smith (3)") and the
/// name-variation marker ("Reid*")
pub fn clean_name(raw: &str) -> String {
    let mut name = normalize_name(raw);

    if name.ends_with(')') {
        if let Some(open) = name.rfind(" (") {
            let inner = &name[open + 2..name.len() - 1];
            if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                name.truncate(open);
            }
        }
    }

    name.trim_end_matches('*').trim().to_string()
}

/// Split "Producer, Mixed By [Assistant], Bass" into roles, ignoring commas
/// inside brackets
pub fn split_roles(role: &str) -> Vec<String> {
    let mut roles = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for c in role.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth <= 0 => {
                roles.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    roles.push(current);

    roles
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Concrete release ids: plain releases as-is, masters via their main release
fn release_ids(releases: &[ReleaseSummary], limit: usize) -> Vec<u64> {
    let mut ids = Vec::new();
    for release in releases {
        let id = match release.kind.as_deref() {
            Some("master") => match release.main_release {
                Some(id) => id,
                None => continue,
            },
            _ => release.id,
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
        if ids.len() >= limit {
            break;
        }
    }
    ids
}

fn membership_evidence(artist_name: &str, artist: &ArtistDetail) -> Vec<Evidence> {
    let members = artist.members.iter().map(|m| {
        Evidence::new(SourceKind::Discography, clean_name(&m.name), artist_name, MEMBER_LABEL)
            .with_payload(json!({"artist_id": artist.id, "member": m.name}))
    });
    let groups = artist.groups.iter().map(|g| {
        Evidence::new(SourceKind::Discography, artist_name, clean_name(&g.name), MEMBER_LABEL)
            .with_payload(json!({"artist_id": artist.id, "group": g.name}))
    });
    members.chain(groups).collect()
}

fn credit_evidence(artist_name: &str, release: &ReleaseDetail) -> Vec<Evidence> {
    let artist_key = name_key(artist_name);
    let mut evidence = Vec::new();

    let release_credits = release.extraartists.iter().map(|c| (None, c));
    let track_credits = release
        .tracklist
        .iter()
        .flat_map(|t| t.extraartists.iter().map(move |c| (Some(t.title.as_str()), c)));

    for (track, credit) in release_credits.chain(track_credits) {
        let person = clean_name(&credit.name);
        if person.is_empty() || name_key(&person) == artist_key {
            continue;
        }

        let context = match track {
            Some(track) => format!("{} / {}", release.title, track),
            None => release.title.clone(),
        };

        for role in split_roles(&credit.role) {
            evidence.push(
                Evidence::new(SourceKind::Discography, person.clone(), artist_name, role)
                    .with_context(context.clone())
                    .with_payload(json!({
                        "release_id": release.id,
                        "release_title": release.title,
                        "track": track,
                        "credit": credit,
                    })),
            );
        }
    }

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("John Smith (3)"), "John Smith");
        assert_eq!(clean_name("Reid*"), "Reid");
        assert_eq!(clean_name("Sunn O)))"), "Sunn O)))");
        assert_eq!(clean_name("Ensemble (Live)"), "Ensemble (Live)");
    }

    #[test]
    fn test_split_roles_respects_brackets() {
        assert_eq!(
            split_roles("Producer, Mixed By [Assistant, Night], Bass"),
            vec!["Producer", "Mixed By [Assistant, Night]", "Bass"]
        );
        assert!(split_roles("").is_empty());
    }

    #[test]
    fn test_release_ids_resolve_masters() {
        let releases = vec![
            ReleaseSummary { id: 1, kind: Some("master".into()), main_release: Some(10) },
            ReleaseSummary { id: 2, kind: Some("release".into()), main_release: None },
            ReleaseSummary { id: 3, kind: Some("master".into()), main_release: None },
            ReleaseSummary { id: 10, kind: None, main_release: None },
            ReleaseSummary { id: 4, kind: None, main_release: None },
        ];
        assert_eq!(release_ids(&releases, 3), vec![10, 2, 4]);
    }

    #[test]
    fn test_track_credits_are_distinct_evidence() {
        let release = ReleaseDetail {
            id: 7,
            title: "Nova".into(),
            genres: vec![],
            styles: vec![],
            extraartists: vec![],
            tracklist: vec![
                Track {
                    title: "One".into(),
                    extraartists: vec![Credit { name: "Kieran Hebden".into(), role: "Producer".into() }],
                },
                Track {
                    title: "Two".into(),
                    extraartists: vec![Credit { name: "Kieran Hebden".into(), role: "Producer".into() }],
                },
            ],
        };

        let evidence = credit_evidence("Steve Reid", &release);
        assert_eq!(evidence.len(), 2);
        assert_ne!(evidence[0].evidence_hash(), evidence[1].evidence_hash());
        assert_eq!(evidence[0].context.as_deref(), Some("Nova / One"));
    }

    #[test]
    fn test_self_credits_skipped() {
        let release = ReleaseDetail {
            id: 1,
            title: "R".into(),
            genres: vec![],
            styles: vec![],
            extraartists: vec![Credit { name: "Steve Reid (2)".into(), role: "Drums".into() }],
            tracklist: vec![],
        };
        assert!(credit_evidence("Steve Reid", &release).is_empty());
    }
}
