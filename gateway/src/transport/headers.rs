//! Header list normalization

use serde_json::Value;
use std::collections::BTreeMap;

/// Turn `[{"name": ..., "value": ...}]` into a name to value map
///
/// Entries without a string `name` are skipped. Non-string values are
/// rendered as JSON text. Anything other than a sequence yields an empty
/// map. Later duplicates win.
pub fn normalize_headers(headers: &Value) -> BTreeMap<String, String> {
    let Value::Array(entries) = headers else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let value = match entry.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Some((name.to_string(), value))
        })
        .collect()
}
