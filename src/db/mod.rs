//! Graph storage using SQLite
//!
//! This module owns the persisted content graph:
//! - Nodes (typed entities forming a forest)
//! - Links (typed, weighted edges between nodes)
//! - Chunks (units of content scoped to a node, with a processing status)
//!
//! Every multi-statement mutation runs in a single transaction whose first
//! statement is a write, so SQLite hands out the write lock before anything
//! is read and no partially applied cascade is ever visible.

mod chunks;
mod links;
mod nodes;
mod schema;
mod upsert;

pub use chunks::*;
pub use links::*;
pub use nodes::*;
pub use schema::*;
pub use upsert::*;

use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Render a timestamp with fixed precision so string order matches time order
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}

/// Graph database handle
#[derive(Clone)]
pub struct GraphDb {
    pool: SqlitePool,
    max_depth: usize,
}

impl GraphDb {
    /// Connect to the graph database described by `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = &config.paths.db_file;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            max_depth: config.graph.max_depth,
        })
    }

    /// Connect and create the schema if this is a fresh database
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Self::connect(config).await?;
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='chunks'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Longest ancestor chain walked on re-parenting
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let node_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;

        let link_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM chunks GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut chunks_by_status: BTreeMap<String, usize> = ChunkStatus::ALL
            .iter()
            .map(|status| (status.to_string(), 0))
            .collect();
        for (status, count) in rows {
            chunks_by_status.insert(status, count as usize);
        }

        Ok(GlobalStats {
            node_count: node_count as usize,
            link_count: link_count as usize,
            chunks_by_status,
        })
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub node_count: usize,
    pub link_count: usize,
    pub chunks_by_status: BTreeMap<String, usize>,
}

impl GlobalStats {
    pub fn chunk_count(&self) -> usize {
        self.chunks_by_status.values().sum()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (GraphDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let db = GraphDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();
        (db, tmp)
    }
}
