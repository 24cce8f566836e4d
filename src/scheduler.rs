//! Lease-based chunk scheduler
//!
//! Workers pull chunks through a compare-and-set claim on the chunk row:
//!
//! ```text
//! pending --claim--> processing --complete(success)--> done
//!                        |
//!                        +------complete(failure)----> error
//! error --retry--> pending
//! done  --reopen--> pending        (only with scheduler.allow_reopen)
//! processing --reclaim_stale--> pending
//! ```
//!
//! All coordination state lives in the chunk's `status`, `worker_token` and
//! `updated_at` columns. The scheduler itself holds no mutable state, so any
//! number of schedulers may run against the same database. Every transition
//! is a single guarded `UPDATE ... RETURNING` statement; no lock is held while
//! a worker processes the chunk's content.

use crate::attrs::Attrs;
use crate::config::SchedulerConfig;
use crate::db::{now, timestamp, Chunk, ChunkStatus, GraphDb};
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Result reported by a worker for a claimed chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn target(self) -> ChunkStatus {
        match self {
            Outcome::Success => ChunkStatus::Done,
            Outcome::Failure => ChunkStatus::Error,
        }
    }
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "success" | "done" | "ok" => Ok(Outcome::Success),
            "failure" | "error" | "failed" => Ok(Outcome::Failure),
            _ => Err(Error::Config(format!("Unknown outcome: {}", s))),
        }
    }
}

/// Stateless driver of chunk status transitions
#[derive(Clone)]
pub struct ChunkScheduler {
    db: GraphDb,
    config: SchedulerConfig,
}

impl ChunkScheduler {
    pub fn new(db: GraphDb, config: SchedulerConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Claim one pending chunk for `worker_token`.
    ///
    /// Exactly one of several concurrent claimants succeeds; the others get
    /// [`Error::AlreadyClaimed`].
    pub async fn claim(&self, chunk_id: &str, worker_token: &str) -> Result<Chunk> {
        let claimed = sqlx::query_as::<_, Chunk>(
            r#"
            UPDATE chunks
            SET status = 'processing', worker_token = ?1, updated_at = ?2
            WHERE chunk_id = ?3 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(worker_token)
        .bind(now())
        .bind(chunk_id)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(chunk) = claimed {
            debug!("Chunk {} claimed by {}", chunk_id, worker_token);
            return Ok(chunk);
        }

        match self.db.find_chunk(chunk_id).await? {
            None => Err(Error::not_found("chunk", chunk_id)),
            Some(chunk) => match chunk.status {
                ChunkStatus::Done | ChunkStatus::Error => Err(Error::InvalidTransition {
                    chunk_id: chunk_id.to_string(),
                    from: chunk.status,
                    action: "claim",
                }),
                // Lost the race, or it was claimed and already handed back
                ChunkStatus::Processing | ChunkStatus::Pending => {
                    Err(Error::AlreadyClaimed(chunk_id.to_string()))
                }
            },
        }
    }

    /// Claim up to `limit` pending chunks, oldest `updated_at` first.
    ///
    /// Returns only the chunks this call won; under contention that may be
    /// fewer than `limit`.
    pub async fn claim_batch(
        &self,
        worker_token: &str,
        scope_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Chunk>> {
        let limit = limit.min(self.config.max_batch_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let candidates: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT chunk_id FROM chunks
            WHERE status = 'pending' AND (?1 IS NULL OR scope_type = ?1)
            ORDER BY updated_at, chunk_id
            LIMIT ?2
            "#,
        )
        .bind(scope_type)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for chunk_id in candidates {
            match self.claim(&chunk_id, worker_token).await {
                Ok(chunk) => claimed.push(chunk),
                Err(e)
                    if e.is_contention()
                        || matches!(
                            e,
                            Error::NotFound { .. } | Error::InvalidTransition { .. }
                        ) =>
                {
                    debug!("Skipping chunk {}: {}", chunk_id, e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Worker {} claimed {}/{} chunks",
            worker_token,
            claimed.len(),
            limit
        );
        Ok(claimed)
    }

    /// Record the outcome of processing a chunk the caller owns.
    ///
    /// `attrs` is merged into the chunk's attrs as a JSON merge patch.
    pub async fn complete(
        &self,
        chunk_id: &str,
        worker_token: &str,
        outcome: Outcome,
        attrs: Option<Attrs>,
    ) -> Result<Chunk> {
        let target = outcome.target();
        let completed = sqlx::query_as::<_, Chunk>(
            r#"
            UPDATE chunks
            SET status = ?1, attrs = json_patch(attrs, ?2), updated_at = ?3
            WHERE chunk_id = ?4 AND status = 'processing' AND worker_token = ?5
            RETURNING *
            "#,
        )
        .bind(target.as_str())
        .bind(Json(attrs.unwrap_or_default()))
        .bind(now())
        .bind(chunk_id)
        .bind(worker_token)
        .fetch_optional(self.db.pool())
        .await?;

        match completed {
            Some(chunk) => {
                info!("Chunk {} completed as {}", chunk_id, target);
                Ok(chunk)
            }
            None => Err(self.owner_failure(chunk_id, worker_token, "complete").await?),
        }
    }

    /// Extend the caller's lease and optionally attach intermediate attrs
    pub async fn heartbeat(
        &self,
        chunk_id: &str,
        worker_token: &str,
        attrs: Option<Attrs>,
    ) -> Result<Chunk> {
        let renewed = sqlx::query_as::<_, Chunk>(
            r#"
            UPDATE chunks
            SET attrs = json_patch(attrs, ?1), updated_at = ?2
            WHERE chunk_id = ?3 AND status = 'processing' AND worker_token = ?4
            RETURNING *
            "#,
        )
        .bind(Json(attrs.unwrap_or_default()))
        .bind(now())
        .bind(chunk_id)
        .bind(worker_token)
        .fetch_optional(self.db.pool())
        .await?;

        match renewed {
            Some(chunk) => {
                debug!("Chunk {} lease renewed by {}", chunk_id, worker_token);
                Ok(chunk)
            }
            None => Err(self.owner_failure(chunk_id, worker_token, "heartbeat").await?),
        }
    }

    /// Explain why an owner-guarded transition matched no row
    async fn owner_failure(
        &self,
        chunk_id: &str,
        worker_token: &str,
        action: &'static str,
    ) -> Result<Error> {
        let Some(chunk) = self.db.find_chunk(chunk_id).await? else {
            return Ok(Error::not_found("chunk", chunk_id));
        };
        if chunk.worker_token.as_deref() != Some(worker_token) {
            return Ok(Error::NotOwner(chunk_id.to_string()));
        }
        Ok(Error::InvalidTransition {
            chunk_id: chunk_id.to_string(),
            from: chunk.status,
            action,
        })
    }

    /// Return a failed chunk to the pending pool
    pub async fn retry(&self, chunk_id: &str) -> Result<Chunk> {
        self.reset_to_pending(chunk_id, ChunkStatus::Error, "retry")
            .await
    }

    /// Return a completed chunk to the pending pool, if policy allows
    pub async fn reopen(&self, chunk_id: &str) -> Result<Chunk> {
        if !self.config.allow_reopen {
            return Err(Error::ReopenDisabled);
        }
        self.reset_to_pending(chunk_id, ChunkStatus::Done, "reopen")
            .await
    }

    async fn reset_to_pending(
        &self,
        chunk_id: &str,
        from: ChunkStatus,
        action: &'static str,
    ) -> Result<Chunk> {
        let reset = sqlx::query_as::<_, Chunk>(
            r#"
            UPDATE chunks
            SET status = 'pending', worker_token = NULL, updated_at = ?1
            WHERE chunk_id = ?2 AND status = ?3
            RETURNING *
            "#,
        )
        .bind(now())
        .bind(chunk_id)
        .bind(from.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(chunk) = reset {
            info!("Chunk {} returned to pending ({})", chunk_id, action);
            return Ok(chunk);
        }

        match self.db.find_chunk(chunk_id).await? {
            None => Err(Error::not_found("chunk", chunk_id)),
            Some(chunk) => Err(Error::InvalidTransition {
                chunk_id: chunk_id.to_string(),
                from: chunk.status,
                action,
            }),
        }
    }

    /// Force chunks stuck in `processing` for longer than `older_than` back to
    /// `pending`, dropping their owner. Returns how many were reclaimed.
    pub async fn reclaim_stale(&self, older_than: Duration) -> Result<u64> {
        let older_than = chrono::Duration::from_std(older_than)
            .map_err(|e| Error::Config(format!("Invalid staleness threshold: {}", e)))?;
        let cutoff = Utc::now()
            .checked_sub_signed(older_than)
            .ok_or_else(|| Error::Config("Staleness threshold out of range".to_string()))?;

        let reclaimed = sqlx::query(
            r#"
            UPDATE chunks
            SET status = 'pending', worker_token = NULL, updated_at = ?1
            WHERE status = 'processing' AND updated_at < ?2
            "#,
        )
        .bind(now())
        .bind(timestamp(cutoff))
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if reclaimed > 0 {
            info!("Reclaimed {} stale chunks", reclaimed);
        }
        Ok(reclaimed)
    }

    /// Reclaim using the configured lease length
    pub async fn reclaim_expired(&self) -> Result<u64> {
        self.reclaim_stale(self.config.stale_after()).await
    }
}
