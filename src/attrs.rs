//! Schema-less attribute payloads
//!
//! Every node, link and chunk carries an `attrs` JSON object. The store never
//! validates it; it only offers containment and key-existence predicates so
//! callers can filter on it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque structured metadata attached to an entity
pub type Attrs = Map<String, Value>;

/// Returns true if `needle` is structurally contained in `haystack`.
///
/// Objects contain another object when every key of the needle is present
/// and its value is contained. Arrays contain another array when every
/// needle element is contained in some haystack element. Scalars must be
/// equal.
pub fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => object_contains(h, n),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|item| h.iter().any(|candidate| contains(candidate, item))),
        // A bare scalar needle matches an array holding it
        (Value::Array(h), scalar) if !scalar.is_object() => h.iter().any(|c| c == scalar),
        (h, n) => h == n,
    }
}

/// Containment over two attribute maps
pub fn object_contains(haystack: &Attrs, needle: &Attrs) -> bool {
    needle.iter().all(|(key, want)| {
        haystack
            .get(key)
            .map(|have| contains(have, want))
            .unwrap_or(false)
    })
}

/// Top-level key existence
pub fn has_key(attrs: &Attrs, key: &str) -> bool {
    attrs.contains_key(key)
}

/// Predicate over an entity's attrs, combining containment and key existence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttrFilter {
    /// Attrs must contain this object
    #[serde(default)]
    pub contains: Option<Attrs>,

    /// Attrs must have every one of these top-level keys
    #[serde(default)]
    pub has_keys: Vec<String>,
}

impl AttrFilter {
    pub fn is_empty(&self) -> bool {
        self.contains.as_ref().map_or(true, |c| c.is_empty()) && self.has_keys.is_empty()
    }

    pub fn matches(&self, attrs: &Attrs) -> bool {
        if let Some(needle) = &self.contains {
            if !object_contains(attrs, needle) {
                return false;
            }
        }
        self.has_keys.iter().all(|key| has_key(attrs, key))
    }
}

/// Parse a JSON object from CLI input
pub fn parse_attrs(raw: &str) -> crate::error::Result<Attrs> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::error::Error::Config(format!(
            "attrs must be a JSON object, got: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Attrs {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_nested_containment() {
        let attrs = json!({
            "population": 12000,
            "tags": ["port", "capital"],
            "climate": { "zone": "temperate", "rain": "high" }
        });

        assert!(contains(&attrs, &json!({ "population": 12000 })));
        assert!(contains(&attrs, &json!({ "tags": ["capital"] })));
        assert!(contains(&attrs, &json!({ "climate": { "zone": "temperate" } })));
        assert!(!contains(&attrs, &json!({ "climate": { "zone": "arid" } })));
        assert!(!contains(&attrs, &json!({ "tags": ["inland"] })));
        assert!(!contains(&attrs, &json!({ "missing": 1 })));
    }

    #[test]
    fn test_empty_needle_always_matches() {
        assert!(contains(&json!({ "a": 1 }), &json!({})));
        assert!(contains(&json!([1, 2]), &json!([])));
    }

    #[test]
    fn test_filter_combines_predicates() {
        let attrs = obj(json!({ "seed": 7, "faction": "guild" }));

        let filter = AttrFilter {
            contains: Some(obj(json!({ "faction": "guild" }))),
            has_keys: vec!["seed".to_string()],
        };
        assert!(filter.matches(&attrs));

        let filter = AttrFilter {
            contains: None,
            has_keys: vec!["seed".to_string(), "era".to_string()],
        };
        assert!(!filter.matches(&attrs));
        assert!(AttrFilter::default().matches(&attrs));
        assert!(AttrFilter::default().is_empty());
    }

    #[test]
    fn test_parse_attrs_rejects_non_objects() {
        assert!(parse_attrs(r#"{"k": "v"}"#).is_ok());
        assert!(parse_attrs("[1, 2]").is_err());
        assert!(parse_attrs("not json").is_err());
    }
}
