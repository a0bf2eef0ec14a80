//! Helpers over telemetry documents
//!
//! A document is an arbitrarily nested JSON tree. Every component of the
//! pipeline works on [`serde_json::Value`] directly.

use serde_json::Value;

/// A telemetry payload: nested mapping / sequence / scalar tree
pub type Document = Value;

/// Short JSON type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Merge `source` into `target`, recursing where both sides are objects
///
/// Non-object values in `source` replace the value at the same key.
/// A non-object `target` is left untouched when `source` is an object,
/// so a merge never changes the shape of an existing leaf.
pub fn deep_merge(target: &mut Value, source: Value) {
    let (Value::Object(target_map), Value::Object(source_map)) = (target, source) else {
        return;
    };
    for (key, value) in source_map {
        match target_map.get_mut(&key) {
            Some(existing @ Value::Object(_)) if value.is_object() => deep_merge(existing, value),
            _ => {
                target_map.insert(key, value);
            }
        }
    }
}

/// Numeric-aware JSON equality
///
/// `1` and `1.0` compare equal; everything else uses structural equality.
/// Integers are compared exactly; only floats go through `f64`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(lhs), Value::Number(rhs)) => {
            if let (Some(l), Some(r)) = (lhs.as_i64(), rhs.as_i64()) {
                return l == r;
            }
            if let (Some(l), Some(r)) = (lhs.as_u64(), rhs.as_u64()) {
                return l == r;
            }
            if !lhs.is_f64() && !rhs.is_f64() {
                // One negative integer, one above i64::MAX
                return false;
            }
            match (lhs.as_f64(), rhs.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => lhs == rhs,
            }
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_recurses_into_objects() {
        let mut target = json!({"a": {"b": 1}, "c": 2});
        deep_merge(&mut target, json!({"a": {"d": 3}, "e": 4}));
        assert_eq!(target, json!({"a": {"b": 1, "d": 3}, "c": 2, "e": 4}));
    }

    #[test]
    fn deep_merge_replaces_scalars() {
        let mut target = json!({"a": 1});
        deep_merge(&mut target, json!({"a": {"b": 2}}));
        assert_eq!(target, json!({"a": {"b": 2}}));
    }

    #[test]
    fn deep_merge_leaves_non_object_target_alone() {
        let mut target = json!([1, 2]);
        deep_merge(&mut target, json!({"a": 1}));
        assert_eq!(target, json!([1, 2]));
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn large_integers_compare_exactly() {
        assert!(!values_equal(&json!(9007199254740993u64), &json!(9007199254740992u64)));
        assert!(values_equal(&json!(9007199254740993u64), &json!(9007199254740993u64)));
        assert!(!values_equal(&json!(-1), &json!(u64::MAX)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!values_equal(&json!(0.1), &json!(0.2)));
    }
}
