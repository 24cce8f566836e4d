//! Default values for configuration

/// Default maximum pooled SQLite connections
pub fn default_max_connections() -> u32 {
    5
}

/// Default time a connection waits on a locked database (milliseconds)
pub fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Default bound on the ancestor walk performed when re-parenting a node
pub fn default_max_depth() -> usize {
    1024
}

/// Default lease length before a processing chunk counts as abandoned (5 minutes)
pub fn default_stale_after_secs() -> u64 {
    300
}

/// Default number of chunks claimed by one `claim-batch`
pub fn default_batch_limit() -> usize {
    16
}

/// Hard cap on chunks claimed in one batch
pub fn default_max_batch_limit() -> usize {
    256
}

/// Default: completed chunks cannot be reopened
pub fn default_allow_reopen() -> bool {
    false
}

/// Default number of records written per bulk upsert transaction
pub fn default_upsert_batch_size() -> usize {
    500
}
