//! Canonical serialization and hashing
//!
//! Every hash in the pipeline goes through [`canonical_hash`]: the value is
//! converted to JSON, volatile fields are stripped at every nesting level,
//! and the result is written with object keys in sorted order and no
//! insignificant whitespace. Two values that differ only in key insertion
//! order or in excluded metadata therefore hash identically.

use crate::hash::{ContentHash, HashError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields stripped before hashing unless a caller supplies its own set
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "timestamp",
    "generated_at",
    "recorded_at",
];

/// Compute the canonical hash of `content` with `excluded_fields` removed
///
/// # Errors
/// Returns error if `content` cannot be represented as JSON
pub fn canonical_hash<T, S>(content: &T, excluded_fields: &[S]) -> Result<ContentHash, HashError>
where
    T: Serialize + ?Sized,
    S: AsRef<str>,
{
    let value = serde_json::to_value(content)?;
    let stripped = strip_fields(value, excluded_fields);
    let bytes = to_canonical_bytes(&stripped)?;
    Ok(ContentHash::compute(&bytes))
}

/// Canonical JSON text of `value` (sorted keys, compact)
///
/// # Errors
/// Returns error if a string or number fails to encode, or if the output
/// is not valid UTF-8
pub fn to_canonical_json(value: &Value) -> Result<String, HashError> {
    Ok(String::from_utf8(to_canonical_bytes(value)?)?)
}

/// Remove every object key named in `excluded` at any depth
#[must_use]
pub fn strip_fields<S: AsRef<str>>(value: Value, excluded: &[S]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !excluded.iter().any(|e| e.as_ref() == k.as_str()))
                .map(|(k, v)| (k, strip_fields(v, excluded)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| strip_fields(v, excluded))
                .collect(),
        ),
        other => other,
    }
}

fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>, HashError> {
    let mut out = Vec::with_capacity(256);
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), HashError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            serde_json::to_writer(&mut *out, value)?;
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push(b'{');
            for (i, (k, v)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, k)?;
                out.push(b':');
                write_canonical(v, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NONE: &[&str] = &[];

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let v = json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
        assert_eq!(
            to_canonical_json(&v).unwrap(),
            r#"{"a":{"c":"x","d":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"title": "Plan", "modules": [{"name": "auth", "purpose": "login"}]});
        let b = json!({"modules": [{"purpose": "login", "name": "auth"}], "title": "Plan"});
        assert_eq!(canonical_hash(&a, NONE).unwrap(), canonical_hash(&b, NONE).unwrap());
    }

    #[test]
    fn excluded_fields_are_ignored_at_any_depth() {
        let a = json!({"id": "a-1", "body": {"text": "hi", "created_at": "2024-01-01"}});
        let b = json!({"id": "b-2", "body": {"text": "hi", "created_at": "2025-06-30"}});
        let excluded = ["id", "created_at"];
        assert_eq!(
            canonical_hash(&a, &excluded).unwrap(),
            canonical_hash(&b, &excluded).unwrap()
        );
        assert_ne!(canonical_hash(&a, NONE).unwrap(), canonical_hash(&b, NONE).unwrap());
    }

    #[test]
    fn semantic_change_changes_hash() {
        let a = json!({"text": "hello"});
        let b = json!({"text": "hello!"});
        assert_ne!(canonical_hash(&a, NONE).unwrap(), canonical_hash(&b, NONE).unwrap());
    }

    #[test]
    fn array_order_is_semantic() {
        let a = json!({"steps": ["a", "b"]});
        let b = json!({"steps": ["b", "a"]});
        assert_ne!(canonical_hash(&a, NONE).unwrap(), canonical_hash(&b, NONE).unwrap());
    }

    #[test]
    fn non_ascii_text_survives_unchanged() {
        let v = json!({"name": "Café ✓ 日本"});
        assert_eq!(to_canonical_json(&v).unwrap(), "{\"name\":\"Café ✓ 日本\"}");
    }

    #[test]
    fn strings_are_escaped() {
        let v = json!({"q": "say \"hi\"\n"});
        assert_eq!(to_canonical_json(&v).unwrap(), r#"{"q":"say \"hi\"\n"}"#);
    }
}
