//! Chunk storage: identity, scope and processing status
//!
//! Status transitions live in [`crate::scheduler`]; this module only creates,
//! reads, lists and deletes chunks.

use super::{now, GraphDb};
use crate::attrs::{AttrFilter, Attrs};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Chunk processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ChunkStatus {
    pub const ALL: [ChunkStatus; 4] = [
        ChunkStatus::Pending,
        ChunkStatus::Processing,
        ChunkStatus::Done,
        ChunkStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Processing => "processing",
            ChunkStatus::Done => "done",
            ChunkStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ChunkStatus::Pending),
            "processing" => Ok(ChunkStatus::Processing),
            "done" => Ok(ChunkStatus::Done),
            "error" => Ok(ChunkStatus::Error),
            _ => Err(Error::Config(format!("Unknown chunk status: {}", s))),
        }
    }
}

/// A unit of content scoped to one node
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub scope_type: String,
    pub scope_node_id: String,
    pub status: ChunkStatus,
    /// Token of the worker that last claimed the chunk
    pub worker_token: Option<String>,
    #[sqlx(json)]
    pub attrs: Attrs,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a chunk about to be created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewChunk {
    pub chunk_id: String,
    pub scope_type: String,
    pub scope_node_id: String,
    #[serde(default)]
    pub attrs: Attrs,
}

impl NewChunk {
    pub fn new(
        chunk_id: impl Into<String>,
        scope_type: impl Into<String>,
        scope_node_id: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            scope_type: scope_type.into(),
            scope_node_id: scope_node_id.into(),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }
}

/// Chunk listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkQuery {
    pub status: Option<ChunkStatus>,
    pub scope_type: Option<String>,
    pub scope_node_id: Option<String>,
    #[serde(default)]
    pub attrs: AttrFilter,
}

/// Content produced under a chunk: nodes grouped by type and their outgoing links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunk_id: String,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub links_count: usize,
}

impl GraphDb {
    // ===== Chunk Operations =====

    /// Create a pending chunk scoped to an existing node
    pub async fn create_chunk(&self, new: NewChunk) -> Result<Chunk> {
        let now = now();
        let chunk = Chunk {
            chunk_id: new.chunk_id,
            scope_type: new.scope_type,
            scope_node_id: new.scope_node_id,
            status: ChunkStatus::Pending,
            worker_token: None,
            attrs: new.attrs,
            created_at: now.clone(),
            updated_at: now,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO chunks (chunk_id, scope_type, scope_node_id, status, attrs, created_at, updated_at)
            SELECT ?1, ?2, ?3, 'pending', ?4, ?5, ?5
            WHERE EXISTS (SELECT 1 FROM nodes WHERE id = ?3)
            "#,
        )
        .bind(&chunk.chunk_id)
        .bind(&chunk.scope_type)
        .bind(&chunk.scope_node_id)
        .bind(Json(&chunk.attrs))
        .bind(&chunk.created_at)
        .execute(self.pool())
        .await
        .map_err(Error::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(Error::InvalidScope(chunk.scope_node_id))
            }
            Ok(_) => {
                debug!("Created chunk {} on node {}", chunk.chunk_id, chunk.scope_node_id);
                Ok(chunk)
            }
            Err(e) if e.is_unique_violation() => Err(Error::AlreadyExists(chunk.chunk_id)),
            Err(e) => Err(e),
        }
    }

    /// Get chunk by key
    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Chunk> {
        self.find_chunk(chunk_id)
            .await?
            .ok_or_else(|| Error::not_found("chunk", chunk_id))
    }

    pub(crate) async fn find_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let chunk = sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE chunk_id = ?")
            .bind(chunk_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(chunk)
    }

    /// Delete a chunk. Nodes referencing it keep their (now dangling) chunk_id.
    pub async fn delete_chunk(&self, chunk_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM chunks WHERE chunk_id = ?")
            .bind(chunk_id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("chunk", chunk_id));
        }
        debug!("Deleted chunk {}", chunk_id);
        Ok(())
    }

    /// List chunks, least recently updated first
    pub async fn list_chunks(&self, query: &ChunkQuery) -> Result<Vec<Chunk>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM chunks WHERE 1 = 1");
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(scope_type) = &query.scope_type {
            builder.push(" AND scope_type = ").push_bind(scope_type);
        }
        if let Some(scope_node_id) = &query.scope_node_id {
            builder.push(" AND scope_node_id = ").push_bind(scope_node_id);
        }
        builder.push(" ORDER BY updated_at, chunk_id");

        let chunks = builder.build_query_as::<Chunk>().fetch_all(self.pool()).await?;
        Ok(chunks
            .into_iter()
            .filter(|chunk| query.attrs.matches(&chunk.attrs))
            .collect())
    }

    /// Count nodes produced under a chunk by type, plus links leaving those nodes
    pub async fn chunk_stats(&self, chunk_id: &str) -> Result<ChunkStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT node_type, COUNT(*) FROM nodes WHERE chunk_id = ? GROUP BY node_type",
        )
        .bind(chunk_id)
        .fetch_all(self.pool())
        .await?;

        let links_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM links l
            JOIN nodes n ON l.src_id = n.id
            WHERE n.chunk_id = ?
            "#,
        )
        .bind(chunk_id)
        .fetch_one(self.pool())
        .await?;

        Ok(ChunkStats {
            chunk_id: chunk_id.to_string(),
            nodes_by_type: rows
                .into_iter()
                .map(|(node_type, count)| (node_type, count as usize))
                .collect(),
            links_count: links_count as usize,
        })
    }
}
