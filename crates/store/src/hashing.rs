//! Canonical JSON hashing used for content-addressed ids and conflict detection.

use md5::{Digest, Md5};
use serde_json::Value;

/// Default set of fields stripped before hashing so payloads that only differ
/// in bookkeeping timestamps hash identically (invariant I5).
pub const DEFAULT_TIMESTAMP_FIELDS: &[&str] = &["updated_at", "last_updated", "timestamp"];

/// Produces a canonical JSON string: object keys sorted recursively, no
/// whitespace. Two values that are structurally equal always produce the
/// same string regardless of field insertion order.
#[must_use]
pub fn canonical_json(value: &Value, exclude_fields: &[&str]) -> String {
    let mut buf = String::new();
    write_canonical(value, exclude_fields, &mut buf);
    buf
}

fn write_canonical(value: &Value, exclude: &[&str], buf: &mut String) {
    match value {
        Value::Object(map) => {
            buf.push('{');
            let mut keys: Vec<&String> = map.keys().filter(|k| !exclude.contains(&k.as_str())).collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(&serde_json::to_string(key).unwrap_or_default());
                buf.push(':');
                write_canonical(&map[*key], exclude, buf);
            }
            buf.push('}');
        }
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, exclude, buf);
            }
            buf.push(']');
        }
        other => buf.push_str(&other.to_string()),
    }
}

/// MD5 hex digest of a value's canonical form, excluding `exclude_fields`.
#[must_use]
pub fn content_hash(value: &Value, exclude_fields: &[&str]) -> String {
    let canonical = canonical_json(value, exclude_fields);
    let digest = Md5::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignores_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a, &[]), content_hash(&b, &[]));
    }

    #[test]
    fn ignores_timestamp_fields() {
        let a = json!({"title": "A", "updated_at": "2024-01-01T00:00:00Z"});
        let b = json!({"title": "A", "updated_at": "2025-06-01T00:00:00Z"});
        assert_eq!(
            content_hash(&a, DEFAULT_TIMESTAMP_FIELDS),
            content_hash(&b, DEFAULT_TIMESTAMP_FIELDS)
        );
    }

    #[test]
    fn differs_on_real_changes() {
        let a = json!({"title": "A"});
        let b = json!({"title": "B"});
        assert_ne!(content_hash(&a, &[]), content_hash(&b, &[]));
    }
}
