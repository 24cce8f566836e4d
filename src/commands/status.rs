//! Status command implementation

use crate::config::Config;
use crate::db::{GlobalStats, GraphDb};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub max_depth: usize,
    pub stale_after_secs: u64,
    pub allow_reopen: bool,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &GraphDb) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.global_stats().await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        max_depth: config.graph.max_depth,
        stale_after_secs: config.scheduler.stale_after_secs,
        allow_reopen: config.scheduler.allow_reopen,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 worldgraph Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nPolicy:");
    println!("  Max hierarchy depth: {}", status.max_depth);
    println!("  Stale after: {}s", status.stale_after_secs);
    println!(
        "  Reopen done chunks: {}",
        if status.allow_reopen { "allowed" } else { "disabled" }
    );
    println!("\nDatabase Stats:");
    println!("  Nodes: {}", status.db_stats.node_count);
    println!("  Links: {}", status.db_stats.link_count);
    println!("  Chunks: {}", status.db_stats.chunk_count());
    for (status, count) in &status.db_stats.chunks_by_status {
        println!("    {}: {}", status, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewChunk, NewNode};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_counts() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = GraphDb::open(&config).await.unwrap();

        let node = db.create_node(NewNode::new("city", "A")).await.unwrap();
        db.create_chunk(NewChunk::new("c", "city", &node.id))
            .await
            .unwrap();

        let status = cmd_status(&config, &db).await.unwrap();
        assert_eq!(status.db_stats.node_count, 1);
        assert_eq!(status.db_stats.chunks_by_status["pending"], 1);
        assert_eq!(status.db_stats.chunks_by_status["done"], 0);
        assert!(!status.allow_reopen);
    }
}
