//! Typed accessors over dynamic attribute bags
//!
//! Node `content` and `metadata` are schemaless JSON maps written by
//! multiple producers. These helpers extract a typed field when it is
//! present and type-matching, and fall back to the caller's default
//! otherwise. No error signalling.

use serde_json::Value;

use super::AttrMap;

/// Extract a string field, or the default when missing or mistyped.
pub fn get_str<'a>(bag: &'a AttrMap, key: &str, default: &'a str) -> &'a str {
    match bag.get(key) {
        Some(Value::String(s)) => s.as_str(),
        _ => default,
    }
}

/// Extract a numeric field as f64, or the default when missing or mistyped.
///
/// Accepts both integer and floating-point storage: a store round-tripped
/// through JSON yields only floats.
pub fn get_f64(bag: &AttrMap, key: &str, default: f64) -> f64 {
    match bag.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        _ => default,
    }
}

/// Extract an integer field, or the default when missing or mistyped.
///
/// Floating-point storage is truncated toward zero so that `3.0` read
/// back from JSON still counts as `3`.
pub fn get_i64(bag: &AttrMap, key: &str, default: i64) -> i64 {
    match bag.get(key) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64() {
                f as i64
            } else {
                default
            }
        }
        _ => default,
    }
}

/// Extract a boolean field, or the default when missing or mistyped.
pub fn get_bool(bag: &AttrMap, key: &str, default: bool) -> bool {
    match bag.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// Extract a nested mapping, or `None` when missing or mistyped.
pub fn get_map<'a>(bag: &'a AttrMap, key: &str) -> Option<&'a AttrMap> {
    match bag.get(key) {
        Some(Value::Object(m)) => Some(m),
        _ => None,
    }
}

/// Extract a sequence of strings.
///
/// Accepts a native string sequence as well as a sequence of mixed
/// dynamic values; non-string items are silently discarded.
pub fn get_str_list(bag: &AttrMap, key: &str) -> Vec<String> {
    match bag.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}
