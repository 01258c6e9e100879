//! Sanitization Module
//!
//! The durable medium is treated as untrusted input. Records are parsed into
//! `serde_json::Value` and every object is rebuilt into a fresh map, key by
//! key. The rebuild is a deny-list: every key is copied except the names in
//! [`FORBIDDEN_KEYS`], which act as prototype-pollution vectors for script
//! consumers of the same data. Payload keys (station codes, timestamps) are
//! open-ended, so no fixed allow-list of names exists to copy against.

use serde_json::{Map, Value};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Object keys never copied out of a persisted record.
pub const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Returns a deep copy of `value` containing only allowed object keys.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut clean = Map::with_capacity(map.len());
            for (key, inner) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    continue;
                }
                clean.insert(key.clone(), sanitize_value(inner));
            }
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

/// Parses and validates one persisted record.
///
/// Fails with `DataCorrupted` when the text is not JSON, is not an object,
/// lacks numeric `timestamp`/`ttl`, or carries a null `data`.
pub fn parse_entry(key: &str, text: &str) -> Result<CacheEntry<Value>> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| CacheError::DataCorrupted(format!("{key}: {e}")))?;
    let record = parsed
        .as_object()
        .ok_or_else(|| CacheError::DataCorrupted(format!("{key}: entry is not an object")))?;

    let timestamp = numeric_field(record, "timestamp")
        .ok_or_else(|| CacheError::DataCorrupted(format!("{key}: invalid entry metadata")))?;
    let ttl = numeric_field(record, "ttl")
        .ok_or_else(|| CacheError::DataCorrupted(format!("{key}: invalid entry metadata")))?;

    let data = match record.get("data") {
        None | Some(Value::Null) => {
            return Err(CacheError::DataCorrupted(format!("{key}: cache data is null")))
        }
        Some(data) => sanitize_value(data),
    };

    Ok(CacheEntry {
        data,
        timestamp,
        ttl,
        access_count: numeric_field(record, "accessCount").unwrap_or(0),
        last_accessed: numeric_field(record, "lastAccessed").unwrap_or(0),
    })
}

// Non-negative numbers only; fractional milliseconds are truncated.
fn numeric_field(record: &Map<String, Value>, name: &str) -> Option<u64> {
    let Value::Number(number) = record.get(name)? else {
        return None;
    };
    number
        .as_u64()
        .or_else(|| number.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_strips_pollution_keys_recursively() {
        let dirty = json!({
            "temp": [20.1, 0],
            "__proto__": { "polluted": true },
            "constructor": { "prototype": { "polluted": true } },
            "nested": {
                "prototype": 1,
                "humidity": [60, 0],
                "list": [{ "__proto__": 1, "ok": 2 }]
            }
        });

        let clean = sanitize_value(&dirty);

        assert_eq!(
            clean,
            json!({
                "temp": [20.1, 0],
                "nested": { "humidity": [60, 0], "list": [{ "ok": 2 }] }
            })
        );
    }

    #[test]
    fn test_sanitize_keeps_scalars() {
        assert_eq!(sanitize_value(&json!("text")), json!("text"));
        assert_eq!(sanitize_value(&json!(1.5)), json!(1.5));
    }

    #[test]
    fn test_parse_valid_entry() {
        let text = r#"{"data":{"t":25},"timestamp":100,"ttl":0,"accessCount":2,"lastAccessed":150}"#;
        let entry = parse_entry("k", text).unwrap();

        assert_eq!(entry.data, json!({ "t": 25 }));
        assert_eq!(entry.timestamp, 100);
        assert_eq!(entry.ttl, 0);
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, 150);
    }

    #[test]
    fn test_parse_defaults_missing_bookkeeping() {
        let entry = parse_entry("k", r#"{"data":1,"timestamp":100.7,"ttl":5}"#).unwrap();

        assert_eq!(entry.timestamp, 100);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed, 0);
    }

    #[test]
    fn test_parse_rejects_corruption() {
        for text in [
            "invalid json{",
            "[1,2,3]",
            "42",
            r#"{"data":1,"timestamp":"yesterday","ttl":5}"#,
            r#"{"data":1,"timestamp":100}"#,
            r#"{"data":1,"timestamp":-5,"ttl":5}"#,
            r#"{"data":null,"timestamp":100,"ttl":5}"#,
            r#"{"timestamp":100,"ttl":5}"#,
        ] {
            assert!(
                matches!(parse_entry("k", text), Err(CacheError::DataCorrupted(_))),
                "{text}"
            );
        }
    }
}
