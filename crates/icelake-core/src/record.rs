//! Record flattening — the leaf of the dependency graph.
//!
//! A flat record maps dotted-path keys to scalar-or-list JSON values.
//! Flattening never explodes arrays: an array leaf (of scalars, or even of
//! nested objects) is stored as a single value under its dotted path.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::IcelakeError;

/// A record after flattening: dotted-path keys in first-encountered order,
/// values restricted (by convention, not by the type system) to
/// `{null, number, string, array}`.
pub type FlatRecord = IndexMap<String, Value>;

/// Flatten a JSON record into dotted-path keys.
///
/// The top-level value must be a JSON object — anything else is a
/// `UserInput` error, since a bare scalar or array cannot be a record.
pub fn flatten(value: &Value) -> Result<FlatRecord, IcelakeError> {
    let Value::Object(map) = value else {
        return Err(IcelakeError::user_input(
            "record is not a JSON object",
        ));
    };
    let mut out = FlatRecord::new();
    for (key, val) in map {
        flatten_into(val, key, &mut out);
    }
    Ok(out)
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatRecord) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let path = format!("{prefix}.{key}");
                flatten_into(val, &path, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects_with_dotted_keys() {
        let input = json!({
            "a": 1.0,
            "b": { "c": "hey", "d": { "e": true } },
        });
        let flat = flatten(&input).unwrap();
        assert_eq!(flat.get("a"), Some(&json!(1.0)));
        assert_eq!(flat.get("b.c"), Some(&json!("hey")));
        assert_eq!(flat.get("b.d.e"), Some(&json!(true)));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn arrays_are_not_exploded() {
        let input = json!({ "tags": ["a", "b", "c"] });
        let flat = flatten(&input).unwrap();
        assert_eq!(flat.get("tags"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn empty_nested_objects_contribute_nothing() {
        let input = json!({ "a": {}, "b": 1.0 });
        let flat = flatten(&input).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("b"), Some(&json!(1.0)));
    }

    #[test]
    fn non_object_top_level_is_user_input_error() {
        let input = json!([1, 2, 3]);
        assert!(flatten(&input).is_err());
    }

    #[test]
    fn preserves_first_encountered_key_order() {
        let input = json!({ "z": 1.0, "a": 2.0 });
        let flat = flatten(&input).unwrap();
        let keys: Vec<&str> = flat.keys().map(|s| s.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
