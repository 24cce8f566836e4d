//! CLI commands implementation

pub mod chunks;
pub mod init;
pub mod links;
pub mod nodes;
pub mod status;
pub mod upsert;

pub use chunks::*;
pub use init::*;
pub use links::*;
pub use nodes::*;
pub use status::*;
pub use upsert::*;

use serde_json::{json, Value};

/// `--json` body for a successful delete
pub fn deleted_report(id: &str) -> Value {
    json!({ "status": "ok", "deleted": id })
}

/// `--json` body for a stale reclaim
pub fn reclaim_report(reclaimed: u64) -> Value {
    json!({ "reclaimed": reclaimed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_report_escapes_caller_keys() {
        let key = r#"city:"quoted"\path"#;
        let rendered = serde_json::to_string(&deleted_report(key)).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["deleted"], key);
        assert_eq!(parsed["status"], "ok");
    }

    #[test]
    fn test_reclaim_report_is_numeric() {
        assert_eq!(reclaim_report(4)["reclaimed"], 4);
    }
}
