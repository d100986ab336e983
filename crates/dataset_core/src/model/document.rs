//! JSON document helpers shared by the model and the SQL layer.

use serde_json::{Map, Value};

/// Shallow top-level merge of `patch` into `base`.
///
/// Keys present in `patch` overwrite or extend `base`; every other key of
/// `base` is kept as-is. Nested objects are replaced, not merged, and a JSON
/// `null` in `patch` is stored as `null` rather than removing the key.
///
/// When either side is not an object the patch wins outright.
pub fn merge_top_level(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

/// Returns the top-level object of `document`, if it is one.
pub fn as_object(document: &Value) -> Option<&Map<String, Value>> {
    match document {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Builds the SQLite JSON path addressing one top-level key.
pub(crate) fn json_path_for_key(key: &str) -> String {
    format!("$.\"{key}\"")
}
