//! Per-consumer data filter
//!
//! The filter is the isolation boundary between consumers: it always
//! returns a fresh owned document, so whatever a consumer's actions do
//! afterwards cannot be observed by any other consumer.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Narrows the event data a consumer receives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFilter {
    allow_categories: Option<BTreeSet<String>>,
}

impl DataFilter {
    /// Open filter: every consumer gets a full copy
    pub fn open() -> Self {
        Self::default()
    }

    /// Only the listed top-level keys survive
    pub fn allow<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_categories: Some(categories.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allow_categories.is_none()
    }

    /// Produce this consumer's private copy of `data`
    pub fn apply(&self, data: &Value) -> Value {
        match (&self.allow_categories, data) {
            (Some(allowed), Value::Object(map)) => Value::Object(
                map.iter()
                    .filter(|(key, _)| allowed.contains(key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Map<String, Value>>(),
            ),
            _ => data.clone(),
        }
    }
}
