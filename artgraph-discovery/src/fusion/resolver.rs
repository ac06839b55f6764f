//! Entity resolution
//!
//! Maps a free-text artist name to a canonical entity id by exact
//! case-insensitive equality on the normalized name, creating the entity on
//! first sight. Persistence failures are logged and yield `None` so the
//! enclosing batch keeps going.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{normalize_name, CanonicalEntity, EntityId, EntityProfile, SourceKind};
use crate::store::GraphStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("artist name is empty")]
    EmptyName,
}

/// A resolved entity id and whether this call created it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: EntityId,
    pub created: bool,
}

#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn GraphStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Resolve `name`, merging `profile` metadata into the entity
    ///
    /// # Errors
    /// `EmptyName` when the name is blank after trimming. Store failures are
    /// not errors: they are logged and reported as `Ok(None)`.
    pub async fn resolve(
        &self,
        name: &str,
        profile: Option<&EntityProfile>,
        via: SourceKind,
    ) -> Result<Option<Resolution>, ResolveError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(ResolveError::EmptyName);
        }

        match self.find_or_create(&name, profile, via).await {
            Ok(resolution) => Ok(Some(resolution)),
            Err(e) => {
                error!(artist = %name, source = %via, "Entity resolution failed: {}", e);
                Ok(None)
            }
        }
    }

    async fn find_or_create(
        &self,
        name: &str,
        profile: Option<&EntityProfile>,
        via: SourceKind,
    ) -> artgraph_common::Result<Resolution> {
        if let Some(existing) = self.store.find_entity_by_name(name).await? {
            return self.enrich(existing, profile).await;
        }

        let entity = CanonicalEntity::new(name, via, profile);
        if self.store.insert_entity(&entity).await? {
            debug!(artist = %name, id = %entity.id, source = %via, "Created entity");
            return Ok(Resolution {
                id: entity.id,
                created: true,
            });
        }

        // Lost an insert race on the same name key; use the winner's row
        match self.store.find_entity_by_name(name).await? {
            Some(existing) => self.enrich(existing, profile).await,
            None => Err(artgraph_common::Error::Internal(format!(
                "entity '{}' neither inserted nor found",
                name
            ))),
        }
    }

    async fn enrich(
        &self,
        mut entity: CanonicalEntity,
        profile: Option<&EntityProfile>,
    ) -> artgraph_common::Result<Resolution> {
        if let Some(profile) = profile {
            if entity.merge_profile(profile) {
                self.store.update_entity_metadata(&entity).await?;
            }
        }

        Ok(Resolution {
            id: entity.id,
            created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RelationType, Relationship};
    use crate::store::{RelationshipUpsert, RelationshipView, SqliteGraphStore, UpsertOutcome};
    use artgraph_common::db::init_memory_database;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store whose first name lookup misses, as if another request inserted
    /// the row between our lookup and our insert
    struct StaleLookupStore {
        inner: SqliteGraphStore,
        stale: AtomicBool,
    }

    #[async_trait]
    impl GraphStore for StaleLookupStore {
        async fn find_entity_by_name(&self, name: &str) -> artgraph_common::Result<Option<CanonicalEntity>> {
            if self.stale.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_entity_by_name(name).await
        }

        async fn find_entity_by_slug(&self, slug: &str) -> artgraph_common::Result<Option<CanonicalEntity>> {
            self.inner.find_entity_by_slug(slug).await
        }

        async fn get_entity(&self, id: EntityId) -> artgraph_common::Result<Option<CanonicalEntity>> {
            self.inner.get_entity(id).await
        }

        async fn insert_entity(&self, entity: &CanonicalEntity) -> artgraph_common::Result<bool> {
            self.inner.insert_entity(entity).await
        }

        async fn update_entity_metadata(&self, entity: &CanonicalEntity) -> artgraph_common::Result<()> {
            self.inner.update_entity_metadata(entity).await
        }

        async fn upsert_relationship(
            &self,
            upsert: &RelationshipUpsert,
        ) -> artgraph_common::Result<UpsertOutcome> {
            self.inner.upsert_relationship(upsert).await
        }

        async fn find_relationship(
            &self,
            source_id: EntityId,
            target_id: EntityId,
            relation_type: RelationType,
        ) -> artgraph_common::Result<Option<Relationship>> {
            self.inner.find_relationship(source_id, target_id, relation_type).await
        }

        async fn relationships_of(
            &self,
            id: EntityId,
        ) -> artgraph_common::Result<(Vec<RelationshipView>, Vec<RelationshipView>)> {
            self.inner.relationships_of(id).await
        }

        async fn count_entities(&self) -> artgraph_common::Result<i64> {
            self.inner.count_entities().await
        }

        async fn count_relationships(&self) -> artgraph_common::Result<i64> {
            self.inner.count_relationships().await
        }
    }

    async fn resolver() -> (EntityResolver, Arc<dyn GraphStore>) {
        let store: Arc<dyn GraphStore> =
            Arc::new(SqliteGraphStore::new(init_memory_database().await.unwrap()));
        (EntityResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_resolve_is_stable() {
        let (resolver, store) = resolver().await;

        let first = resolver.resolve("Steve Reid", None, SourceKind::Ai).await.unwrap().unwrap();
        let second = resolver.resolve(" steve  REID ", None, SourceKind::Registry).await.unwrap().unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_entities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (resolver, store) = resolver().await;

        assert_eq!(
            resolver.resolve("   ", None, SourceKind::Ai).await,
            Err(ResolveError::EmptyName)
        );
        assert_eq!(store.count_entities().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_profile_enriches_existing_entity() {
        let (resolver, store) = resolver().await;
        let id = resolver.resolve("Four Tet", None, SourceKind::Ai).await.unwrap().unwrap().id;

        let mut profile = EntityProfile::new(SourceKind::Discography, "Four Tet");
        profile.external_id = Some("6543".into());
        profile.genres = vec!["Electronic".into()];
        resolver.resolve("Four Tet", Some(&profile), SourceKind::Discography).await.unwrap();

        let entity = store.get_entity(id).await.unwrap().unwrap();
        assert_eq!(entity.external_ids.get("discography").map(String::as_str), Some("6543"));
        assert!(entity.genres.contains("electronic"));
        assert_eq!(entity.created_via, "ai");
    }

    #[tokio::test]
    async fn test_store_failure_yields_none() {
        let pool = init_memory_database().await.unwrap();
        let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(pool.clone()));
        let resolver = EntityResolver::new(store);
        pool.close().await;

        assert_eq!(resolver.resolve("Anyone", None, SourceKind::Ai).await, Ok(None));
    }

    #[tokio::test]
    async fn test_lost_insert_race_uses_existing_row() {
        let pool = init_memory_database().await.unwrap();
        let winner = EntityResolver::new(Arc::new(SqliteGraphStore::new(pool.clone())));
        let first = winner.resolve("Kieran Hebden", None, SourceKind::Ai).await.unwrap().unwrap();

        let racing: Arc<dyn GraphStore> = Arc::new(StaleLookupStore {
            inner: SqliteGraphStore::new(pool.clone()),
            stale: AtomicBool::new(true),
        });
        let loser = EntityResolver::new(racing.clone());

        let mut profile = EntityProfile::new(SourceKind::Discography, "Kieran Hebden");
        profile.external_id = Some("123".into());
        let second = loser
            .resolve("KIERAN hebden", Some(&profile), SourceKind::Discography)
            .await
            .unwrap()
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(racing.count_entities().await.unwrap(), 1);

        let entity = racing.get_entity(first.id).await.unwrap().unwrap();
        assert_eq!(entity.external_ids.get("discography").map(String::as_str), Some("123"));
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_converge() {
        let (resolver, store) = resolver().await;
        let other = resolver.clone();

        let (a, b) = tokio::join!(
            resolver.resolve("Four Tet", None, SourceKind::Ai),
            other.resolve("four tet", None, SourceKind::Registry),
        );
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());

        assert_eq!(a.id, b.id);
        assert_eq!([a.created, b.created].iter().filter(|c| **c).count(), 1);
        assert_eq!(store.count_entities().await.unwrap(), 1);
    }
}
