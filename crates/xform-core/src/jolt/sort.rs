//! The `sort` operation: order object keys recursively
//!
//! Keys starting with `~` come first, the rest follow in lexicographic
//! order. Array element order is left alone.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Sort every object in the document by key
pub fn sort(input: Value) -> Value {
    match input {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort).collect()),
        other => other,
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.starts_with('~'), b.starts_with('~')) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}
