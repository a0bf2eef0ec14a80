//! Per-consumer configuration

use crate::action::ActionSpec;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Configuration of one consumer
///
/// The well-known fields are typed; every other field of the declaration
/// (host, port, credentials, ...) is kept in `settings` for the consumer
/// implementation to read.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer implementation name, e.g. `Generic_HTTP`
    #[serde(rename = "type")]
    pub consumer_type: String,

    /// Name used in traces and logs; empty means "use the consumer id"
    #[serde(rename = "traceName", default)]
    pub trace_name: String,

    #[serde(default = "enabled")]
    pub enable: bool,

    /// Applied in order to every event before delivery
    #[serde(default)]
    pub actions: Vec<ActionSpec>,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

fn enabled() -> bool {
    true
}

impl ConsumerConfig {
    pub fn new(consumer_type: impl Into<String>) -> Self {
        Self {
            consumer_type: consumer_type.into(),
            trace_name: String::new(),
            enable: true,
            actions: Vec::new(),
            settings: Map::new(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(Value::as_bool)
    }
}
