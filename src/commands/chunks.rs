//! Chunk and scheduler command implementation

use crate::attrs::{parse_attrs, AttrFilter, Attrs};
use crate::db::{Chunk, ChunkQuery, ChunkStats, ChunkStatus, GraphDb};
use crate::error::Result;

/// Flags accepted by `chunk list`
#[derive(Debug, Clone, Default)]
pub struct ChunkListOptions {
    pub status: Option<String>,
    pub scope_type: Option<String>,
    pub scope_node: Option<String>,
    pub contains: Option<String>,
    pub has_keys: Vec<String>,
}

pub async fn cmd_list_chunks(db: &GraphDb, options: ChunkListOptions) -> Result<Vec<Chunk>> {
    let query = ChunkQuery {
        status: options
            .status
            .as_deref()
            .map(str::parse::<ChunkStatus>)
            .transpose()?,
        scope_type: options.scope_type,
        scope_node_id: options.scope_node,
        attrs: AttrFilter {
            contains: options.contains.as_deref().map(parse_attrs).transpose()?,
            has_keys: options.has_keys,
        },
    };
    db.list_chunks(&query).await
}

/// Parse an optional `--attrs` JSON argument
pub fn optional_attrs(raw: Option<&str>) -> Result<Option<Attrs>> {
    raw.map(parse_attrs).transpose()
}

pub fn print_chunk(chunk: &Chunk) {
    println!("• {} [{}]", chunk.chunk_id, chunk.status);
    println!("  Scope: {} {}", chunk.scope_type, chunk.scope_node_id);
    if let Some(token) = &chunk.worker_token {
        println!("  Worker: {}", token);
    }
    if !chunk.attrs.is_empty() {
        println!(
            "  Attrs: {}",
            serde_json::Value::Object(chunk.attrs.clone())
        );
    }
    println!("  Updated: {}", chunk.updated_at);
}

pub fn print_chunks(chunks: &[Chunk]) {
    if chunks.is_empty() {
        println!("No chunks found.");
        return;
    }
    for chunk in chunks {
        print_chunk(chunk);
    }
}

pub fn print_chunk_stats(stats: &ChunkStats) {
    println!("\n📦 Chunk {}\n", stats.chunk_id);
    if stats.nodes_by_type.is_empty() {
        println!("No nodes reference this chunk.");
    } else {
        println!("Nodes:");
        for (node_type, count) in &stats.nodes_by_type {
            println!("  {}: {}", node_type, count);
        }
    }
    println!("Links: {}", stats.links_count);
}
