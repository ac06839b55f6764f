//! Graph store boundary
//!
//! Persistence contract for entities and relationships. Writes are upserts on
//! natural keys: `name_key` for entities and `(source_id, target_id, type)`
//! for relationships. Concurrent requests share one store without further
//! locking; idempotency comes from those keys.

pub mod sqlite;

use artgraph_common::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{CanonicalEntity, EntityId, RelationType, Relationship, SourceKind};

pub use sqlite::SqliteGraphStore;

/// One piece of evidence ready to be merged into a relationship
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipUpsert {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: RelationType,
    /// 0-10; stored strength becomes `max(old, new)`
    pub strength: u8,
    pub source: SourceKind,
    pub evidence_hash: String,
    pub raw_evidence: serde_json::Value,
    /// Kept only if the relationship has no notes yet
    pub notes: Option<String>,
}

/// What an upsert did to the relationship row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row with this evidence as its first provenance
    Created(Uuid),
    /// Existing row; count incremented, strength raised, provenance appended
    Merged(Uuid),
    /// This exact evidence was already recorded; nothing changed
    Unchanged(Uuid),
}

impl UpsertOutcome {
    pub fn relationship_id(&self) -> Uuid {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Merged(id) | UpsertOutcome::Unchanged(id) => *id,
        }
    }
}

/// A relationship together with the display names of both ends
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RelationshipView {
    #[serde(flatten)]
    pub relationship: Relationship,
    pub source_name: String,
    pub target_name: String,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Exact case-insensitive lookup by (normalized) name
    async fn find_entity_by_name(&self, name: &str) -> Result<Option<CanonicalEntity>>;

    /// First entity with this slug (slugs are not unique)
    async fn find_entity_by_slug(&self, slug: &str) -> Result<Option<CanonicalEntity>>;

    async fn get_entity(&self, id: EntityId) -> Result<Option<CanonicalEntity>>;

    /// Insert unless the name key already exists; true when inserted
    async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<bool>;

    /// Persist aliases, genres, bio and external ids of an existing entity
    async fn update_entity_metadata(&self, entity: &CanonicalEntity) -> Result<()>;

    /// Merge one piece of evidence into its relationship, atomically
    async fn upsert_relationship(&self, upsert: &RelationshipUpsert) -> Result<UpsertOutcome>;

    async fn find_relationship(
        &self,
        source_id: EntityId,
        target_id: EntityId,
        relation_type: RelationType,
    ) -> Result<Option<Relationship>>;

    /// Outgoing and incoming relationships of an entity
    async fn relationships_of(
        &self,
        id: EntityId,
    ) -> Result<(Vec<RelationshipView>, Vec<RelationshipView>)>;

    async fn count_entities(&self) -> Result<i64>;

    async fn count_relationships(&self) -> Result<i64>;
}
