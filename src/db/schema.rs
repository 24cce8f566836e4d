//! SQLite schema definition

/// SQL schema for the graph database
pub const SCHEMA_SQL: &str = r#"
-- Nodes: typed entities forming a forest through parent_id
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    node_type TEXT NOT NULL,
    name TEXT NOT NULL,
    parent_id TEXT REFERENCES nodes(id) ON DELETE CASCADE,
    slug TEXT,
    chunk_id TEXT,
    attrs TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> id)
);

-- Links: typed, directed, weighted edges between nodes
CREATE TABLE IF NOT EXISTS links (
    id TEXT PRIMARY KEY,
    src_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    dst_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    link_type TEXT NOT NULL,
    weight REAL,
    attrs TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

-- Chunks: units of content scoped to a node, processed by workers
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_node_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'done', 'error')),
    worker_token TEXT,
    attrs TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id, created_at);
CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type);
CREATE INDEX IF NOT EXISTS idx_nodes_chunk ON nodes(chunk_id);
CREATE INDEX IF NOT EXISTS idx_links_src ON links(src_id, link_type);
CREATE INDEX IF NOT EXISTS idx_links_dst ON links(dst_id, link_type);
CREATE INDEX IF NOT EXISTS idx_chunks_status ON chunks(status, updated_at);
CREATE INDEX IF NOT EXISTS idx_chunks_scope ON chunks(scope_node_id);
"#;
