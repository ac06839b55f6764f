//! AI analysis cache
//!
//! Content-addressed: the key is a SHA-256 over the normalized subject, the
//! normalized track (blank and absent are the same) and the context. Reads only
//! hit within the recency window; writes are upserts so a forced refresh
//! overwrites the previous generation.

use artgraph_common::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::models::normalize_name;

/// A cached analysis row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedAnalysis {
    pub subject_name: String,
    pub track_name: Option<String>,
    pub context: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Cache key for a (subject, track, context) triple
pub fn cache_key(subject: &str, track: Option<&str>, context: &str) -> String {
    let subject = normalize_name(subject).to_lowercase();
    let track = track.map(|t| normalize_name(t).to_lowercase()).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update([0u8]);
    hasher.update(track.as_bytes());
    hasher.update([0u8]);
    hasher.update(context.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Fixed-width UTC timestamp so stored values order lexicographically
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct AnalysisCache {
    db: SqlitePool,
    window: Duration,
}

impl AnalysisCache {
    pub fn new(db: SqlitePool, window: Duration) -> Self {
        Self { db, window }
    }

    /// Cached payload younger than the window, if any
    pub async fn get(
        &self,
        subject: &str,
        track: Option<&str>,
        context: &str,
    ) -> Result<Option<CachedAnalysis>> {
        let key = cache_key(subject, track, context);

        let row = sqlx::query(
            r#"
            SELECT subject_name, track_name, context, payload, created_at
            FROM analysis_cache
            WHERE cache_key = ?
            "#,
        )
        .bind(&key)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            debug!(subject = %subject, context, "Analysis cache miss");
            return Ok(None);
        };

        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("Invalid cache timestamp: {}", e)))?;

        if Utc::now() - created_at > self.window {
            debug!(subject = %subject, context, "Analysis cache entry expired");
            return Ok(None);
        }

        let payload: String = row.get("payload");
        debug!(subject = %subject, context, "Analysis cache hit");

        Ok(Some(CachedAnalysis {
            subject_name: row.get("subject_name"),
            track_name: row.get("track_name"),
            context: row.get("context"),
            payload: serde_json::from_str(&payload)?,
            created_at,
        }))
    }

    /// Store (or overwrite) the payload for a key
    pub async fn set(
        &self,
        subject: &str,
        track: Option<&str>,
        context: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let track = track.map(str::trim).filter(|t| !t.is_empty());

        sqlx::query(
            r#"
            INSERT INTO analysis_cache (cache_key, subject_name, track_name, context, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                subject_name = excluded.subject_name,
                track_name = excluded.track_name,
                payload = excluded.payload,
                created_at = excluded.created_at
            "#,
        )
        .bind(cache_key(subject, track, context))
        .bind(normalize_name(subject))
        .bind(track)
        .bind(context)
        .bind(payload.to_string())
        .bind(timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete rows older than the window; returns how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let cutoff = timestamp(Utc::now() - self.window);

        let result = sqlx::query("DELETE FROM analysis_cache WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
