//! Relationship fusion
//!
//! Turns one piece of [`Evidence`] plus the two resolved entity ids into a
//! relationship upsert. Never returns an error: every failure is an outcome.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::vocabulary::{map_label, strength};
use crate::models::{EntityId, Evidence};
use crate::store::{GraphStore, RelationshipUpsert, UpsertOutcome};

/// Why a piece of evidence produced no write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "label", rename_all = "snake_case")]
pub enum SkipReason {
    SelfLoop,
    MissingEntity,
    UnmappedLabel(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SelfLoop => f.write_str("self_loop"),
            SkipReason::MissingEntity => f.write_str("missing_entity"),
            SkipReason::UnmappedLabel(label) => write!(f, "unmapped_label: {}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuseOutcome {
    Created(Uuid),
    Merged(Uuid),
    /// Evidence already recorded for this relationship
    Unchanged(Uuid),
    Skipped(SkipReason),
    /// Persistence error, already logged
    Failed(String),
}

impl FuseOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, FuseOutcome::Created(_))
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, FuseOutcome::Merged(_))
    }
}

impl From<UpsertOutcome> for FuseOutcome {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Created(id) => FuseOutcome::Created(id),
            UpsertOutcome::Merged(id) => FuseOutcome::Merged(id),
            UpsertOutcome::Unchanged(id) => FuseOutcome::Unchanged(id),
        }
    }
}

#[derive(Clone)]
pub struct RelationshipFuser {
    store: Arc<dyn GraphStore>,
}

impl RelationshipFuser {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn fuse(
        &self,
        source: Option<EntityId>,
        target: Option<EntityId>,
        evidence: &Evidence,
    ) -> FuseOutcome {
        let (Some(source_id), Some(target_id)) = (source, target) else {
            return FuseOutcome::Skipped(SkipReason::MissingEntity);
        };
        if source_id == target_id {
            return FuseOutcome::Skipped(SkipReason::SelfLoop);
        }

        let Some(relation_type) = map_label(evidence.source, &evidence.relation_label) else {
            debug!(
                source = %evidence.source,
                label = %evidence.relation_label,
                "Skipping unmapped relation label"
            );
            return FuseOutcome::Skipped(SkipReason::UnmappedLabel(evidence.relation_label.clone()));
        };

        let upsert = RelationshipUpsert {
            source_id,
            target_id,
            relation_type,
            strength: strength(evidence, relation_type),
            source: evidence.source,
            evidence_hash: evidence.evidence_hash(),
            raw_evidence: evidence.raw_payload.clone(),
            notes: evidence.context.clone(),
        };

        match self.store.upsert_relationship(&upsert).await {
            Ok(outcome) => {
                debug!(
                    source = %evidence.source,
                    from = %evidence.subject_name,
                    to = %evidence.target_name,
                    relation = %relation_type,
                    ?outcome,
                    "Fused evidence"
                );
                outcome.into()
            }
            Err(e) => {
                error!(
                    source = %evidence.source,
                    from = %evidence.subject_name,
                    to = %evidence.target_name,
                    "Relationship upsert failed: {}",
                    e
                );
                FuseOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::EntityResolver;
    use crate::models::{RelationType, SourceKind};
    use crate::store::SqliteGraphStore;
    use artgraph_common::db::init_memory_database;
    use serde_json::json;

    struct Fixture {
        store: Arc<dyn GraphStore>,
        resolver: EntityResolver,
        fuser: RelationshipFuser,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn GraphStore> =
            Arc::new(SqliteGraphStore::new(init_memory_database().await.unwrap()));
        Fixture {
            resolver: EntityResolver::new(store.clone()),
            fuser: RelationshipFuser::new(store.clone()),
            store,
        }
    }

    impl Fixture {
        async fn id(&self, name: &str) -> Option<EntityId> {
            self.resolver
                .resolve(name, None, SourceKind::Discography)
                .await
                .unwrap()
                .map(|r| r.id)
        }
    }

    fn producer_credit(track: &str) -> Evidence {
        Evidence::new(SourceKind::Discography, "A", "B", "Producer")
            .with_context("Release X")
            .with_payload(json!({"release": "Release X", "track": track}))
    }

    #[tokio::test]
    async fn test_same_evidence_twice_is_one_row() {
        let f = fixture().await;
        let (a, b) = (f.id("A").await, f.id("B").await);
        let evidence = producer_credit("One");

        assert!(f.fuser.fuse(a, b, &evidence).await.is_created());
        assert!(matches!(f.fuser.fuse(a, b, &evidence).await, FuseOutcome::Unchanged(_)));

        assert_eq!(f.store.count_relationships().await.unwrap(), 1);
        let rel = f
            .store
            .find_relationship(a.unwrap(), b.unwrap(), RelationType::Producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rel.collaboration_count, 1);
        assert_eq!(rel.strength, 7);
        assert_eq!(rel.notes.as_deref(), Some("Release X"));
    }

    #[tokio::test]
    async fn test_two_tracks_merge_into_count_two() {
        let f = fixture().await;
        let (a, b) = (f.id("A").await, f.id("B").await);

        assert!(f.fuser.fuse(a, b, &producer_credit("One")).await.is_created());
        assert!(f.fuser.fuse(a, b, &producer_credit("Two")).await.is_merged());

        let rel = f
            .store
            .find_relationship(a.unwrap(), b.unwrap(), RelationType::Producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rel.collaboration_count, 2);
        assert_eq!(rel.provenance.len(), 2);
    }

    #[tokio::test]
    async fn test_self_loop_and_missing_entity_skipped() {
        let f = fixture().await;
        let a = f.id("A").await;

        assert_eq!(
            f.fuser.fuse(a, a, &producer_credit("One")).await,
            FuseOutcome::Skipped(SkipReason::SelfLoop)
        );
        assert_eq!(
            f.fuser.fuse(a, None, &producer_credit("One")).await,
            FuseOutcome::Skipped(SkipReason::MissingEntity)
        );
        assert_eq!(f.store.count_relationships().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_label_skipped() {
        let f = fixture().await;
        let (a, b) = (f.id("A").await, f.id("B").await);
        let evidence = Evidence::new(SourceKind::Discography, "A", "B", "Design [Cover]");

        assert_eq!(
            f.fuser.fuse(a, b, &evidence).await,
            FuseOutcome::Skipped(SkipReason::UnmappedLabel("Design [Cover]".into()))
        );
    }

    #[tokio::test]
    async fn test_different_types_are_different_rows() {
        let f = fixture().await;
        let (a, b) = (f.id("A").await, f.id("B").await);

        f.fuser.fuse(a, b, &producer_credit("One")).await;
        let composer = Evidence::new(SourceKind::Discography, "A", "B", "Written-By");
        assert!(f.fuser.fuse(a, b, &composer).await.is_created());

        assert_eq!(f.store.count_relationships().await.unwrap(), 2);
    }
}
