//! Canonical artist entities
//!
//! Identity is the case-folded, whitespace-normalized name. Nothing fuzzier:
//! "The Beatles" and "Beatles" are different entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::evidence::SourceKind;

pub type EntityId = Uuid;

/// Collapse internal whitespace runs to one space and trim
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive identity key for an already-normalized name
pub fn name_key(normalized: &str) -> String {
    normalized.to_lowercase()
}

/// URL slug: lowercase, every run of non-alphanumerics becomes one `-`
///
/// # Examples
///
/// ```
/// use artgraph_discovery::models::slugify;
///
/// assert_eq!(slugify("Steve Reid"), "steve-reid");
/// assert_eq!(slugify("  AC/DC!! "), "ac-dc");
/// assert_eq!(slugify("Björk"), "björk");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Persisted artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: EntityId,
    /// Display form (normalized whitespace, original casing of first sighting)
    pub name: String,
    pub slug: String,
    pub aliases: BTreeSet<String>,
    pub genres: BTreeSet<String>,
    pub bio: Option<String>,
    pub bio_source: Option<SourceKind>,
    /// Upstream identifiers keyed by source tag
    pub external_ids: BTreeMap<String, String>,
    /// Which source first referenced this entity
    pub created_via: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalEntity {
    /// New entity for a normalized name, seeded from an optional profile
    pub fn new(name: &str, created_via: SourceKind, profile: Option<&EntityProfile>) -> Self {
        let now = Utc::now();
        let mut entity = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            aliases: BTreeSet::new(),
            genres: BTreeSet::new(),
            bio: None,
            bio_source: None,
            external_ids: BTreeMap::new(),
            created_via: created_via.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        if let Some(profile) = profile {
            entity.merge_profile(profile);
        }
        entity
    }

    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Add-only merge of profile metadata; returns true if anything changed
    ///
    /// Aliases and genres are unioned, external ids are added but never
    /// overwritten, and the bio is replaced only when empty or when the profile's
    /// source ranks strictly higher in bio trust.
    pub fn merge_profile(&mut self, profile: &EntityProfile) -> bool {
        let mut changed = false;

        let own_key = self.name_key();
        for alias in profile.aliases.iter().map(|a| normalize_name(a)) {
            if !alias.is_empty() && name_key(&alias) != own_key {
                changed |= self.aliases.insert(alias);
            }
        }

        for genre in profile.genres.iter().map(|g| normalize_name(g).to_lowercase()) {
            if !genre.is_empty() {
                changed |= self.genres.insert(genre);
            }
        }

        if let Some(external_id) = profile.external_id.as_deref().filter(|id| !id.is_empty()) {
            let key = profile.source.as_str().to_string();
            if !self.external_ids.contains_key(&key) {
                self.external_ids.insert(key, external_id.to_string());
                changed = true;
            }
        }

        if let Some(bio) = profile.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            let replace = match (&self.bio, self.bio_source) {
                (None, _) => true,
                (Some(current), _) if current.trim().is_empty() => true,
                (Some(_), Some(current_source)) => {
                    profile.source.bio_trust() > current_source.bio_trust()
                }
                (Some(_), None) => true,
            };
            if replace && self.bio.as_deref() != Some(bio) {
                self.bio = Some(bio.to_string());
                self.bio_source = Some(profile.source);
                changed = true;
            }
        }

        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

/// Opportunistic entity metadata returned by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub source: SourceKind,
    pub name: String,
    pub bio: Option<String>,
    pub genres: Vec<String>,
    pub aliases: Vec<String>,
    /// The source's own identifier for this artist
    pub external_id: Option<String>,
}

impl EntityProfile {
    pub fn new(source: SourceKind, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            bio: None,
            genres: Vec::new(),
            aliases: Vec::new(),
            external_id: None,
        }
    }
}
