//! Read endpoints over the graph and the analysis cache

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cache::CachedAnalysis;
use crate::error::{ApiError, ApiResult};
use crate::models::{normalize_name, CanonicalEntity, DiscoveryType};
use crate::store::RelationshipView;
use crate::AppState;

/// Entity with its edges in both directions
#[derive(Debug, Serialize)]
pub struct ArtistGraph {
    pub entity: CanonicalEntity,
    pub outgoing: Vec<RelationshipView>,
    pub incoming: Vec<RelationshipView>,
}

/// GET /artists/:slug
pub async fn get_artist(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ArtistGraph>> {
    let entity = state
        .store
        .find_entity_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("artist '{}'", slug)))?;

    let (outgoing, incoming) = state.store.relationships_of(entity.id).await?;

    Ok(Json(ArtistGraph {
        entity,
        outgoing,
        incoming,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    #[serde(default)]
    pub subject_name: String,
    pub track_name: Option<String>,
    #[serde(default)]
    pub discovery_type: DiscoveryType,
}

/// GET /analysis
///
/// Same recency window as the pipeline's own cache reads.
pub async fn get_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> ApiResult<Json<CachedAnalysis>> {
    let subject = normalize_name(&query.subject_name);
    if subject.is_empty() {
        return Err(ApiError::BadRequest(
            "subject_name must not be empty".to_string(),
        ));
    }

    let track = query
        .track_name
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    state
        .cache
        .get(&subject, track, query.discovery_type.as_str())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no cached analysis for '{}'", subject)))
}
