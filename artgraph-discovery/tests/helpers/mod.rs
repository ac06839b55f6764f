//! Shared fixtures for artgraph-discovery integration tests

#![allow(dead_code)]

use artgraph_common::db::init_memory_database;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use artgraph_discovery::cache::AnalysisCache;
use artgraph_discovery::config::PipelineConfig;
use artgraph_discovery::models::{
    ArtistAnalysis, DiscoveryType, EntityProfile, Evidence, Recommendation, SourceKind,
};
use artgraph_discovery::pipeline::DiscoveryPipeline;
use artgraph_discovery::sources::{
    AdapterError, AnalysisSource, SourceAdapter, SourceQuery, SourceReport,
};
use artgraph_discovery::store::{GraphStore, SqliteGraphStore};

pub fn recommendation(name: &str, score: f64, relationship: &str) -> Recommendation {
    Recommendation {
        artist_name: name.to_string(),
        similarity_score: score,
        relationship_type: relationship.to_string(),
        explanation: format!("{} explanation", name),
    }
}

pub fn analysis(recommendations: Vec<Recommendation>) -> ArtistAnalysis {
    ArtistAnalysis {
        reasoning: "test reasoning".to_string(),
        recommendations,
    }
}

/// AI double answering every call the same way and counting calls
pub struct FakeAi {
    response: Result<ArtistAnalysis, AdapterError>,
    calls: AtomicUsize,
}

impl FakeAi {
    pub fn answering(analysis: ArtistAnalysis) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(analysis),
            calls: AtomicUsize::new(0),
        })
    }

    /// Behaves like the real client fed this model output
    pub fn from_model_output(text: &str) -> Arc<Self> {
        Arc::new(Self {
            response: ArtistAnalysis::from_model_output(text).map_err(AdapterError::MalformedPayload),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisSource for FakeAi {
    async fn analyze(
        &self,
        _subject: &str,
        _track: Option<&str>,
        _discovery_type: DiscoveryType,
    ) -> Result<ArtistAnalysis, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

type Responder = Box<dyn Fn(&SourceQuery) -> SourceReport + Send + Sync>;

/// Secondary source double driven by a closure
pub struct FakeAdapter {
    kind: SourceKind,
    respond: Responder,
    queries: Mutex<Vec<SourceQuery>>,
}

impl FakeAdapter {
    pub fn new(
        kind: SourceKind,
        respond: impl Fn(&SourceQuery) -> SourceReport + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Always fails with the given error
    pub fn failing(kind: SourceKind, error: AdapterError) -> Arc<Self> {
        Self::new(kind, move |_| SourceReport::failed(kind, error.clone()))
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceReport {
        self.queries.lock().unwrap().push(query.clone());
        (self.respond)(query)
    }
}

/// Report with the given evidence and a profile for the queried artist
pub fn report(kind: SourceKind, query: &SourceQuery, evidence: Vec<Evidence>) -> SourceReport {
    let mut report = SourceReport::empty(kind);
    report.evidence = evidence;
    report.profiles.push(EntityProfile {
        external_id: Some(format!("{}-id", query.artist.to_lowercase())),
        ..EntityProfile::new(kind, query.artist.clone())
    });
    report
}

pub struct Harness {
    pub db: SqlitePool,
    pub store: Arc<dyn GraphStore>,
    pub cache: AnalysisCache,
    pub pipeline: Arc<DiscoveryPipeline>,
}

pub async fn harness(
    ai: Arc<dyn AnalysisSource>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    config: PipelineConfig,
) -> Harness {
    let db = init_memory_database().await.unwrap();
    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(db.clone()));
    let cache = AnalysisCache::new(db.clone(), config.cache_window);
    let pipeline = Arc::new(DiscoveryPipeline::new(
        ai,
        adapters,
        store.clone(),
        cache.clone(),
        config,
    ));

    Harness {
        db,
        store,
        cache,
        pipeline,
    }
}
