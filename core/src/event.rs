//! Telemetry events
//!
//! An [`Event`] is produced once by a collector and consumed once by the
//! forwarder. Each consumer then works on its own [`ContextEvent`], built
//! from a private copy of the event data.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A unit of telemetry addressed to a set of consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Telemetry category, e.g. `systemInfo` or `LTM`
    #[serde(rename = "type")]
    pub event_type: String,

    /// The telemetry document
    pub data: Document,

    /// Ids of the consumers this event is addressed to
    #[serde(rename = "destinationIds", default)]
    pub destination_ids: BTreeSet<String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Document) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            destination_ids: BTreeSet::new(),
        }
    }

    /// Address the event to the given consumer ids
    pub fn with_destinations<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn is_addressed_to(&self, consumer_id: &str) -> bool {
        self.destination_ids.contains(consumer_id)
    }
}

/// The event as seen by one consumer
///
/// Owned by a single dispatch. Actions mutate `data` in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Document,
}

impl ContextEvent {
    pub fn new(event_type: impl Into<String>, data: Document) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_shape() {
        let event: Event = serde_json::from_value(json!({
            "type": "systemInfo",
            "data": {"system": {"hostname": "h1"}},
            "destinationIds": ["splunk", "kafka"]
        }))
        .unwrap();
        assert_eq!(event.event_type, "systemInfo");
        assert!(event.is_addressed_to("kafka"));
        assert!(!event.is_addressed_to("other"));
    }

    #[test]
    fn destinations_default_to_empty() {
        let event: Event = serde_json::from_value(json!({"type": "t", "data": {}})).unwrap();
        assert!(event.destination_ids.is_empty());
    }

    #[test]
    fn builder_deduplicates_destinations() {
        let event = Event::new("t", json!({})).with_destinations(["a", "b", "a"]);
        assert_eq!(event.destination_ids.len(), 2);
    }

    #[test]
    fn context_event_serializes_type_key() {
        let ctx = ContextEvent::new("LTM", json!({"x": 1}));
        assert_eq!(
            serde_json::to_value(&ctx).unwrap(),
            json!({"type": "LTM", "data": {"x": 1}})
        );
    }
}
