//! Persisted relationships between canonical entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::entity::EntityId;
use super::evidence::SourceKind;

/// Closed relationship type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Collaboration,
    Remix,
    Featured,
    Producer,
    Composer,
    Musician,
    Engineer,
    Influence,
    GroupMember,
    LabelMate,
    SideProject,
}

impl RelationType {
    pub const ALL: [RelationType; 11] = [
        RelationType::Collaboration,
        RelationType::Remix,
        RelationType::Featured,
        RelationType::Producer,
        RelationType::Composer,
        RelationType::Musician,
        RelationType::Engineer,
        RelationType::Influence,
        RelationType::GroupMember,
        RelationType::LabelMate,
        RelationType::SideProject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Collaboration => "collaboration",
            RelationType::Remix => "remix",
            RelationType::Featured => "featured",
            RelationType::Producer => "producer",
            RelationType::Composer => "composer",
            RelationType::Musician => "musician",
            RelationType::Engineer => "engineer",
            RelationType::Influence => "influence",
            RelationType::GroupMember => "group_member",
            RelationType::LabelMate => "label_mate",
            RelationType::SideProject => "side_project",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown relation type: {}", s))
    }
}

/// One contribution to a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source: SourceKind,
    pub evidence_hash: String,
    pub raw_evidence: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

/// Persisted edge, unique on `(source_id, target_id, relation_type)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: RelationType,
    /// 0-10
    pub strength: u8,
    pub collaboration_count: i64,
    pub verified: bool,
    pub notes: Option<String>,
    pub provenance: Vec<ProvenanceEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
