//! Discovery pipeline orchestrator
//!
//! Per request: cache check → AI reasoning (skipped on a cache hit) → optional
//! secondary fan-out over the recommended artists → fusion → response.
//!
//! # Error Handling
//! - Only an empty subject fails a run, before any side effect
//! - AI failure substitutes the fallback analysis and logs one `error_log` entry
//! - Each source failure for each candidate is logged and the batch continues
//! - Persistence failures skip the entity or relationship

use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::progress::ProgressSink;
use crate::cache::AnalysisCache;
use crate::config::PipelineConfig;
use crate::fusion::vocabulary::map_label;
use crate::fusion::{EntityResolver, FuseOutcome, RelationshipFuser};
use crate::models::{
    normalize_name, slugify, ArtistAnalysis, DiscoveryRequest, DiscoveryResponse, DiscoveryResults,
    EnhancementResult, EntityId, EntityProfile, ErrorLogEntry, Evidence, RelationType, SourceKind,
};
use crate::sources::{AnalysisSource, BudgetedAdapter, SourceAdapter, SourceQuery, SourceReport};
use crate::store::GraphStore;
use artgraph_common::events::ProgressEvent;

pub const STEP_CACHE_CHECK: &str = "cache_check";
pub const STEP_CACHE_HIT: &str = "cache_hit";
pub const STEP_AI_REASONING: &str = "ai_reasoning";
pub const STEP_AI_FALLBACK: &str = "ai_fallback";
pub const STEP_CACHE_WRITE: &str = "cache_write";
pub const STEP_SECONDARY_FANOUT: &str = "secondary_fanout";
pub const STEP_FUSION: &str = "fusion";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
}

/// Running tallies of graph mutations
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    created: u32,
    merged: u32,
    new_entities: u32,
}

impl Tally {
    fn record(&mut self, outcome: &FuseOutcome) {
        match outcome {
            FuseOutcome::Created(_) => self.created += 1,
            FuseOutcome::Merged(_) => self.merged += 1,
            _ => {}
        }
    }

    fn add_to(&self, results: &mut DiscoveryResults) {
        results.relationships_created += self.created;
        results.relationships_merged += self.merged;
        results.new_artists_discovered += self.new_entities;
    }
}

pub struct DiscoveryPipeline {
    ai: Arc<dyn AnalysisSource>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: AnalysisCache,
    resolver: EntityResolver,
    fuser: RelationshipFuser,
    config: PipelineConfig,
}

impl DiscoveryPipeline {
    pub fn new(
        ai: Arc<dyn AnalysisSource>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: Arc<dyn GraphStore>,
        cache: AnalysisCache,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ai,
            adapters,
            cache,
            resolver: EntityResolver::new(store.clone()),
            fuser: RelationshipFuser::new(store),
            config,
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Reject requests that must not reach any side effect
    pub fn validate(request: &DiscoveryRequest) -> Result<(), PipelineError> {
        if normalize_name(&request.subject_name).is_empty() {
            return Err(PipelineError::Validation(
                "subject_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Execute one discovery run
    ///
    /// Emits progress on `progress` and finishes with exactly one terminal
    /// event (`final_result`, or `error` for an invalid request).
    pub async fn run(
        &self,
        request: &DiscoveryRequest,
        progress: &ProgressSink,
    ) -> Result<DiscoveryResponse, PipelineError> {
        if let Err(e) = Self::validate(request) {
            progress.emit(ProgressEvent::Error {
                message: e.to_string(),
            });
            return Err(e);
        }

        let subject = normalize_name(&request.subject_name);
        let track = request.track();
        let context = request.discovery_type.as_str();
        let mut results = DiscoveryResults::default();

        info!(
            subject = %subject,
            track = ?track,
            discovery_type = %request.discovery_type,
            force_refresh = request.force_refresh,
            request_id = %progress.request_id(),
            "Discovery run started"
        );

        // CacheCheck
        progress.status("Checking analysis cache", 5);
        let cached = if request.force_refresh {
            debug!(subject = %subject, "Cache bypassed by force_refresh");
            None
        } else {
            self.cached_analysis(&subject, track, context).await
        };
        results.steps_completed.push(STEP_CACHE_CHECK.to_string());

        // AIReasoning
        let (analysis, fresh) = match cached {
            Some(analysis) => {
                results.cache_hit = true;
                results.steps_completed.push(STEP_CACHE_HIT.to_string());
                (analysis, false)
            }
            None => {
                progress.status(format!("Asking AI about {}", subject), 15);
                self.reason(&subject, track, request, &mut results).await
            }
        };

        results.ai_recommendations = analysis.recommendations.clone();
        progress.partial(
            STEP_AI_REASONING,
            json!({
                "reasoning": analysis.reasoning,
                "recommendations": analysis.recommendations,
                "cache_hit": results.cache_hit,
            }),
        );
        progress.status(
            format!("{} recommendations", analysis.recommendations.len()),
            30,
        );

        let candidates: Vec<String> = analysis
            .recommendations
            .iter()
            .take(self.config.max_candidates)
            .map(|r| r.artist_name.clone())
            .collect();

        if fresh && !candidates.is_empty() {
            self.fuse_ai_recommendations(&subject, &analysis)
                .await
                .add_to(&mut results);
        }

        // SecondaryFanOut + Fusion
        if request.auto_enhance && !candidates.is_empty() {
            let reports = self
                .fan_out(&subject, &candidates, request, progress)
                .await;
            results
                .steps_completed
                .push(STEP_SECONDARY_FANOUT.to_string());
            progress.partial(
                STEP_SECONDARY_FANOUT,
                json!({
                    "candidates": candidates,
                    "reports": reports.iter().map(|(_, r)| r.len()).sum::<usize>(),
                }),
            );

            progress.status("Fusing relationships", 85);
            for (candidate, candidate_reports) in &reports {
                for report in candidate_reports {
                    let enhancement = self.fuse_report(candidate, report, &mut results).await;
                    results.enhancement_results.push(enhancement);
                }
            }
            results.steps_completed.push(STEP_FUSION.to_string());
            progress.partial(STEP_FUSION, json!(results.enhancement_results));
        }

        // Respond
        let response = DiscoveryResponse {
            success: true,
            summary: summarize(&subject, &results),
            next_actions: next_actions(&subject, request, &analysis, &results),
            results,
        };

        info!(
            subject = %subject,
            recommendations = response.results.ai_recommendations.len(),
            created = response.results.relationships_created,
            merged = response.results.relationships_merged,
            errors = response.results.error_log.len(),
            "Discovery run complete"
        );

        progress.status("Done", 100);
        match serde_json::to_value(&response) {
            Ok(data) => progress.emit(ProgressEvent::FinalResult { data }),
            Err(e) => progress.emit(ProgressEvent::Error {
                message: format!("failed to serialize response: {}", e),
            }),
        }

        Ok(response)
    }

    /// Cached analysis within the window; read errors count as a miss
    async fn cached_analysis(
        &self,
        subject: &str,
        track: Option<&str>,
        context: &str,
    ) -> Option<ArtistAnalysis> {
        match self.cache.get(subject, track, context).await {
            Ok(Some(hit)) => match serde_json::from_value::<ArtistAnalysis>(hit.payload) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!(subject = %subject, "Ignoring undecodable cached analysis: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(subject = %subject, "Analysis cache read failed: {}", e);
                None
            }
        }
    }

    /// AI step; returns the analysis and whether it was freshly generated
    async fn reason(
        &self,
        subject: &str,
        track: Option<&str>,
        request: &DiscoveryRequest,
        results: &mut DiscoveryResults,
    ) -> (ArtistAnalysis, bool) {
        let context = request.discovery_type.as_str();

        match self.ai.analyze(subject, track, request.discovery_type).await {
            Ok(analysis) => {
                let written = match serde_json::to_value(&analysis) {
                    Ok(payload) => self.cache.set(subject, track, context, &payload).await,
                    Err(e) => Err(artgraph_common::Error::from(e)),
                };
                if let Err(e) = written {
                    warn!(subject = %subject, "Analysis cache write failed: {}", e);
                    results
                        .error_log
                        .push(ErrorLogEntry::new(STEP_CACHE_WRITE, e.to_string()));
                }

                results.steps_completed.push(STEP_AI_REASONING.to_string());
                (analysis, true)
            }
            Err(e) => {
                warn!(subject = %subject, "AI reasoning failed, using fallback: {}", e);
                results
                    .error_log
                    .push(ErrorLogEntry::new(STEP_AI_REASONING, e.to_string()));
                results.steps_completed.push(STEP_AI_FALLBACK.to_string());
                (ArtistAnalysis::fallback(), false)
            }
        }
    }

    /// Subject → recommendation edges from a fresh analysis
    async fn fuse_ai_recommendations(&self, subject: &str, analysis: &ArtistAnalysis) -> Tally {
        let mut tally = Tally::default();
        let Some(subject_id) = self.resolve(subject, None, SourceKind::Ai, &mut tally).await else {
            return tally;
        };

        for rec in analysis.recommendations.iter().take(self.config.max_candidates) {
            let target_id = self
                .resolve(&rec.artist_name, None, SourceKind::Ai, &mut tally)
                .await;

            let mut evidence = Evidence::new(
                SourceKind::Ai,
                subject,
                rec.artist_name.as_str(),
                rec.relationship_type.as_str(),
            )
            .with_strength_hint(rec.similarity_score)
            .with_payload(json!(rec));
            if !rec.explanation.trim().is_empty() {
                evidence = evidence.with_context(rec.explanation.trim());
            }

            let outcome = self.fuser.fuse(Some(subject_id), target_id, &evidence).await;
            tally.record(&outcome);
        }

        tally
    }

    /// Query every selected source for every candidate, within budget
    async fn fan_out(
        &self,
        subject: &str,
        candidates: &[String],
        request: &DiscoveryRequest,
        progress: &ProgressSink,
    ) -> Vec<(String, Vec<SourceReport>)> {
        let budgeted: Vec<BudgetedAdapter> = self
            .adapters
            .iter()
            .filter(|adapter| adapter.supports(request.discovery_type))
            .map(|adapter| BudgetedAdapter::new(adapter.clone(), self.config.max_candidates))
            .collect();

        if budgeted.is_empty() {
            debug!(discovery_type = %request.discovery_type, "No secondary sources selected");
            return candidates.iter().map(|c| (c.clone(), Vec::new())).collect();
        }

        let total = candidates.len();
        let budgeted = &budgeted;

        let tasks: Vec<_> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| async move {
                let query = SourceQuery::new(candidate.as_str()).related_to(subject);
                let mut reports = Vec::with_capacity(budgeted.len());
                for adapter in budgeted {
                    reports.push(adapter.fetch(&query).await);
                }

                let percent = 30 + ((index + 1) * 50 / total.max(1)) as u8;
                progress.status(format!("Enhanced {} ({}/{})", candidate, index + 1, total), percent);
                (candidate.clone(), reports)
            })
            .collect();

        stream::iter(tasks)
            .buffered(self.config.fanout_concurrency.max(1))
            .collect()
            .await
    }

    /// Resolve both sides of every evidence item in one report and fuse it
    async fn fuse_report(
        &self,
        candidate: &str,
        report: &SourceReport,
        results: &mut DiscoveryResults,
    ) -> EnhancementResult {
        let mut enhancement = EnhancementResult {
            artist_name: candidate.to_string(),
            source: report.source,
            entity_id: None,
            evidence_count: report.evidence.len(),
            relationships_created: 0,
            relationships_merged: 0,
            error: None,
        };

        if let Some(error) = &report.error {
            warn!(source = %report.source, artist = %candidate, "Source failed: {}", error);
            results.error_log.push(ErrorLogEntry::new(
                STEP_SECONDARY_FANOUT,
                format!("{} ({}): {}", report.source, candidate, error),
            ));
            enhancement.error = Some(error.to_string());
            return enhancement;
        }

        let mut tally = Tally::default();
        enhancement.entity_id = self
            .resolve(candidate, report.profile_for(candidate), report.source, &mut tally)
            .await;

        let mut members = 0usize;
        for evidence in &report.evidence {
            // Membership from any source counts against the cap
            if map_label(report.source, &evidence.relation_label) == Some(RelationType::GroupMember) {
                if members >= self.config.max_members_per_result {
                    continue;
                }
                members += 1;
            }

            let source_id = self
                .resolve(
                    &evidence.subject_name,
                    report.profile_for(&evidence.subject_name),
                    report.source,
                    &mut tally,
                )
                .await;
            let target_id = self
                .resolve(
                    &evidence.target_name,
                    report.profile_for(&evidence.target_name),
                    report.source,
                    &mut tally,
                )
                .await;

            let outcome = self.fuser.fuse(source_id, target_id, evidence).await;
            if let FuseOutcome::Failed(e) = &outcome {
                results.error_log.push(ErrorLogEntry::new(
                    STEP_FUSION,
                    format!("{} -> {}: {}", evidence.subject_name, evidence.target_name, e),
                ));
            }
            tally.record(&outcome);
        }

        enhancement.relationships_created = tally.created;
        enhancement.relationships_merged = tally.merged;
        tally.add_to(results);
        enhancement
    }

    async fn resolve(
        &self,
        name: &str,
        profile: Option<&EntityProfile>,
        via: SourceKind,
        tally: &mut Tally,
    ) -> Option<EntityId> {
        match self.resolver.resolve(name, profile, via).await {
            Ok(Some(resolution)) => {
                if resolution.created {
                    tally.new_entities += 1;
                }
                Some(resolution.id)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(source = %via, "Skipping evidence side: {}", e);
                None
            }
        }
    }
}

fn summarize(subject: &str, results: &DiscoveryResults) -> String {
    let origin = if results.cache_hit { " (cached analysis)" } else { "" };
    format!(
        "Found {} related artists for {}{}; {} relationships created, {} merged, {} new artists",
        results.ai_recommendations.len(),
        subject,
        origin,
        results.relationships_created,
        results.relationships_merged,
        results.new_artists_discovered,
    )
}

fn next_actions(
    subject: &str,
    request: &DiscoveryRequest,
    analysis: &ArtistAnalysis,
    results: &DiscoveryResults,
) -> Vec<String> {
    let mut actions = Vec::new();

    if analysis.is_fallback() {
        actions.push("Retry later with force_refresh once the AI service is available".to_string());
    } else {
        actions.push(format!("Explore the graph at /artists/{}", slugify(subject)));
    }
    if !request.auto_enhance && !analysis.recommendations.is_empty() {
        actions.push("Re-run with auto_enhance to enrich recommended artists".to_string());
    }
    if !results.error_log.is_empty() {
        actions.push("Review error_log for sources that failed".to_string());
    }

    actions
}
