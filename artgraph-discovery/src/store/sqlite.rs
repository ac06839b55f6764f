//! SQLite graph store

use artgraph_common::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{GraphStore, RelationshipUpsert, RelationshipView, UpsertOutcome};
use crate::models::{
    name_key, normalize_name, CanonicalEntity, EntityId, ProvenanceEntry, RelationType,
    Relationship, SourceKind,
};

const ENTITY_COLUMNS: &str = "id, name, slug, aliases, genres, bio, bio_source, external_ids, \
                              created_via, created_at, updated_at";

const RELATIONSHIP_COLUMNS: &str = "r.id, r.source_id, r.target_id, r.relation_type, r.strength, \
                                    r.collaboration_count, r.verified, r.notes, r.created_at, \
                                    r.updated_at";

#[derive(Clone)]
pub struct SqliteGraphStore {
    db: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn provenance_for(&self, relationship_id: Uuid) -> Result<Vec<ProvenanceEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT source, evidence_hash, raw_evidence, processed_at
            FROM relationship_provenance
            WHERE relationship_id = ?
            ORDER BY id
            "#,
        )
        .bind(relationship_id.to_string())
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                let source: String = row.get("source");
                let raw: Option<String> = row.get("raw_evidence");
                Ok(ProvenanceEntry {
                    source: source.parse::<SourceKind>().map_err(Error::Internal)?,
                    evidence_hash: row.get("evidence_hash"),
                    raw_evidence: match raw {
                        Some(raw) => serde_json::from_str(&raw)?,
                        None => serde_json::Value::Null,
                    },
                    processed_at: parse_time(row.get("processed_at"))?,
                })
            })
            .collect()
    }

    async fn relationship_views(&self, column: &str, id: EntityId) -> Result<Vec<RelationshipView>> {
        let sql = format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}, s.name AS source_name, t.name AS target_name
            FROM relationships r
            JOIN entities s ON s.id = r.source_id
            JOIN entities t ON t.id = r.target_id
            WHERE r.{column} = ?
            ORDER BY r.strength DESC, r.collaboration_count DESC, t.name
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_all(&self.db)
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut relationship = relationship_from_row(row)?;
            relationship.provenance = self.provenance_for(relationship.id).await?;
            views.push(RelationshipView {
                relationship,
                source_name: row.get("source_name"),
                target_name: row.get("target_name"),
            });
        }
        Ok(views)
    }

    async fn entity_where(&self, clause: &str, value: String) -> Result<Option<CanonicalEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE {clause} ORDER BY created_at LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(entity_from_row).transpose()
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn find_entity_by_name(&self, name: &str) -> Result<Option<CanonicalEntity>> {
        self.entity_where("name_key = ?", name_key(&normalize_name(name)))
            .await
    }

    async fn find_entity_by_slug(&self, slug: &str) -> Result<Option<CanonicalEntity>> {
        self.entity_where("slug = ?", slug.to_string()).await
    }

    async fn get_entity(&self, id: EntityId) -> Result<Option<CanonicalEntity>> {
        self.entity_where("id = ?", id.to_string()).await
    }

    async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO entities (
                id, name, name_key, slug, aliases, genres, bio, bio_source,
                external_ids, created_via, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name_key) DO NOTHING
            "#,
        )
        .bind(entity.id.to_string())
        .bind(&entity.name)
        .bind(entity.name_key())
        .bind(&entity.slug)
        .bind(serde_json::to_string(&entity.aliases)?)
        .bind(serde_json::to_string(&entity.genres)?)
        .bind(&entity.bio)
        .bind(entity.bio_source.map(|s| s.as_str()))
        .bind(serde_json::to_string(&entity.external_ids)?)
        .bind(&entity.created_via)
        .bind(entity.created_at.to_rfc3339())
        .bind(entity.updated_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_entity_metadata(&self, entity: &CanonicalEntity) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE entities SET
                aliases = ?,
                genres = ?,
                bio = ?,
                bio_source = ?,
                external_ids = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(&entity.aliases)?)
        .bind(serde_json::to_string(&entity.genres)?)
        .bind(&entity.bio)
        .bind(entity.bio_source.map(|s| s.as_str()))
        .bind(serde_json::to_string(&entity.external_ids)?)
        .bind(entity.updated_at.to_rfc3339())
        .bind(entity.id.to_string())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn upsert_relationship(&self, upsert: &RelationshipUpsert) -> Result<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let source_id = upsert.source_id.to_string();
        let target_id = upsert.target_id.to_string();
        let relation_type = upsert.relation_type.as_str();

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO relationships (
                id, source_id, target_id, relation_type, strength,
                collaboration_count, verified, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?, ?)
            ON CONFLICT(source_id, target_id, relation_type) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&source_id)
        .bind(&target_id)
        .bind(relation_type)
        .bind(i64::from(upsert.strength))
        .bind(&upsert.notes)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let id: String = sqlx::query_scalar(
            "SELECT id FROM relationships WHERE source_id = ? AND target_id = ? AND relation_type = ?",
        )
        .bind(&source_id)
        .bind(&target_id)
        .bind(relation_type)
        .fetch_one(&mut *tx)
        .await?;
        let relationship_id = parse_uuid(&id)?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO relationship_provenance (
                relationship_id, evidence_hash, source, raw_evidence, processed_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(relationship_id, evidence_hash) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&upsert.evidence_hash)
        .bind(upsert.source.as_str())
        .bind(upsert.raw_evidence.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !recorded {
            tx.commit().await?;
            return Ok(UpsertOutcome::Unchanged(relationship_id));
        }

        sqlx::query(
            r#"
            UPDATE relationships SET
                collaboration_count = collaboration_count + 1,
                strength = MAX(strength, ?),
                notes = COALESCE(notes, ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(i64::from(upsert.strength))
        .bind(&upsert.notes)
        .bind(&now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if inserted {
            UpsertOutcome::Created(relationship_id)
        } else {
            UpsertOutcome::Merged(relationship_id)
        })
    }

    async fn find_relationship(
        &self,
        source_id: EntityId,
        target_id: EntityId,
        relation_type: RelationType,
    ) -> Result<Option<Relationship>> {
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships r
             WHERE r.source_id = ? AND r.target_id = ? AND r.relation_type = ?"
        );
        let row = sqlx::query(&sql)
            .bind(source_id.to_string())
            .bind(target_id.to_string())
            .bind(relation_type.as_str())
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => {
                let mut relationship = relationship_from_row(&row)?;
                relationship.provenance = self.provenance_for(relationship.id).await?;
                Ok(Some(relationship))
            }
            None => Ok(None),
        }
    }

    async fn relationships_of(
        &self,
        id: EntityId,
    ) -> Result<(Vec<RelationshipView>, Vec<RelationshipView>)> {
        let outgoing = self.relationship_views("source_id", id).await?;
        let incoming = self.relationship_views("target_id", id).await?;
        Ok((outgoing, incoming))
    }

    async fn count_entities(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.db)
            .await?)
    }

    async fn count_relationships(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.db)
            .await?)
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", value, e)))
}

fn parse_time(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

fn entity_from_row(row: &SqliteRow) -> Result<CanonicalEntity> {
    let id: String = row.get("id");
    let aliases: String = row.get("aliases");
    let genres: String = row.get("genres");
    let external_ids: String = row.get("external_ids");
    let bio_source: Option<String> = row.get("bio_source");

    Ok(CanonicalEntity {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        slug: row.get("slug"),
        aliases: serde_json::from_str(&aliases)?,
        genres: serde_json::from_str(&genres)?,
        bio: row.get("bio"),
        bio_source: bio_source
            .map(|s| s.parse::<SourceKind>())
            .transpose()
            .map_err(Error::Internal)?,
        external_ids: serde_json::from_str(&external_ids)?,
        created_via: row.get("created_via"),
        created_at: parse_time(row.get("created_at"))?,
        updated_at: parse_time(row.get("updated_at"))?,
    })
}

fn relationship_from_row(row: &SqliteRow) -> Result<Relationship> {
    let id: String = row.get("id");
    let source_id: String = row.get("source_id");
    let target_id: String = row.get("target_id");
    let relation_type: String = row.get("relation_type");
    let strength: i64 = row.get("strength");
    let verified: i64 = row.get("verified");

    Ok(Relationship {
        id: parse_uuid(&id)?,
        source_id: parse_uuid(&source_id)?,
        target_id: parse_uuid(&target_id)?,
        relation_type: relation_type.parse::<RelationType>().map_err(Error::Internal)?,
        strength: strength.clamp(0, 10) as u8,
        collaboration_count: row.get("collaboration_count"),
        verified: verified != 0,
        notes: row.get("notes"),
        provenance: Vec::new(),
        created_at: parse_time(row.get("created_at"))?,
        updated_at: parse_time(row.get("updated_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use artgraph_common::db::init_memory_database;
    use serde_json::json;

    async fn store() -> SqliteGraphStore {
        SqliteGraphStore::new(init_memory_database().await.unwrap())
    }

    async fn entity(store: &SqliteGraphStore, name: &str) -> CanonicalEntity {
        let entity = CanonicalEntity::new(name, SourceKind::Ai, None);
        assert!(store.insert_entity(&entity).await.unwrap());
        entity
    }

    fn upsert(a: &CanonicalEntity, b: &CanonicalEntity, hash: &str, strength: u8) -> RelationshipUpsert {
        RelationshipUpsert {
            source_id: a.id,
            target_id: b.id,
            relation_type: RelationType::Producer,
            strength,
            source: SourceKind::Discography,
            evidence_hash: hash.to_string(),
            raw_evidence: json!({"hash": hash}),
            notes: Some(format!("note {}", hash)),
        }
    }

    #[tokio::test]
    async fn test_insert_entity_conflicts_on_name_key() {
        let store = store().await;
        entity(&store, "Steve Reid").await;

        let duplicate = CanonicalEntity::new("STEVE REID", SourceKind::Registry, None);
        assert!(!store.insert_entity(&duplicate).await.unwrap());
        assert_eq!(store.count_entities().await.unwrap(), 1);

        let found = store.find_entity_by_name("  steve   reid ").await.unwrap().unwrap();
        assert_eq!(found.name, "Steve Reid");
        assert_eq!(store.find_entity_by_slug("steve-reid").await.unwrap().unwrap().id, found.id);
    }

    #[tokio::test]
    async fn test_entity_metadata_round_trip() {
        let store = store().await;
        let mut e = entity(&store, "Four Tet").await;

        let mut profile = crate::models::EntityProfile::new(SourceKind::Encyclopedia, "Four Tet");
        profile.bio = Some("English musician.".into());
        profile.genres = vec!["Electronic".into()];
        profile.external_id = Some("42".into());
        assert!(e.merge_profile(&profile));
        store.update_entity_metadata(&e).await.unwrap();

        let loaded = store.get_entity(e.id).await.unwrap().unwrap();
        assert_eq!(loaded.bio.as_deref(), Some("English musician."));
        assert_eq!(loaded.bio_source, Some(SourceKind::Encyclopedia));
        assert!(loaded.genres.contains("electronic"));
        assert_eq!(loaded.external_ids.get("encyclopedia").map(String::as_str), Some("42"));
    }

    #[tokio::test]
    async fn test_upsert_created_merged_unchanged() {
        let store = store().await;
        let a = entity(&store, "A").await;
        let b = entity(&store, "B").await;

        let first = store.upsert_relationship(&upsert(&a, &b, "h1", 5)).await.unwrap();
        assert!(matches!(first, UpsertOutcome::Created(_)));

        let replay = store.upsert_relationship(&upsert(&a, &b, "h1", 9)).await.unwrap();
        assert_eq!(replay, UpsertOutcome::Unchanged(first.relationship_id()));

        let second = store.upsert_relationship(&upsert(&a, &b, "h2", 7)).await.unwrap();
        assert_eq!(second, UpsertOutcome::Merged(first.relationship_id()));

        let rel = store
            .find_relationship(a.id, b.id, RelationType::Producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rel.collaboration_count, 2);
        assert_eq!(rel.strength, 7);
        assert_eq!(rel.notes.as_deref(), Some("note h1"));
        assert_eq!(rel.provenance.len(), 2);
        assert!(!rel.verified);
        assert_eq!(store.count_relationships().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_strength_never_lowered() {
        let store = store().await;
        let a = entity(&store, "A").await;
        let b = entity(&store, "B").await;

        store.upsert_relationship(&upsert(&a, &b, "h1", 8)).await.unwrap();
        store.upsert_relationship(&upsert(&a, &b, "h2", 4)).await.unwrap();

        let rel = store
            .find_relationship(a.id, b.id, RelationType::Producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rel.strength, 8);
    }

    #[tokio::test]
    async fn test_relationships_of_splits_directions() {
        let store = store().await;
        let a = entity(&store, "A").await;
        let b = entity(&store, "B").await;
        let c = entity(&store, "C").await;

        store.upsert_relationship(&upsert(&a, &b, "h1", 5)).await.unwrap();
        store.upsert_relationship(&upsert(&c, &a, "h2", 5)).await.unwrap();

        let (outgoing, incoming) = store.relationships_of(a.id).await.unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target_name, "B");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_name, "C");
        assert_eq!(incoming[0].relationship.provenance.len(), 1);
    }
}
