//! Action processor
//!
//! Runs a consumer's actions against its private copy of the event, in
//! declared order. Each action sees the document as left by the previous
//! one. A failing action is logged, counted and skipped; it never stops the
//! remaining actions or the delivery.

use crate::metrics;
use serde_json::Value;
use telemux_core::document::deep_merge;
use telemux_core::{ActionKind, ActionSpec, ContextEvent, ExpressionError, LocationSpec, TagSet, TagValue};
use tracing::{debug, error};

/// What happened to one consumer's action list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionReport {
    pub applied: usize,
    /// Disabled, or condition did not match
    pub skipped: usize,
    pub failed: Vec<ActionFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionFailure {
    /// Position in the action list
    pub index: usize,
    pub action: &'static str,
    pub error: String,
}

/// Apply `actions` to `event.data` in place
pub fn process_actions(consumer_id: &str, event: &mut ContextEvent, actions: &[ActionSpec]) -> ActionReport {
    let mut report = ActionReport::default();

    for (index, action) in actions.iter().enumerate() {
        let name = action.kind.name();
        if !action.applies_to(&event.data) {
            debug!(consumer = consumer_id, index, action = name, "Action skipped");
            report.skipped += 1;
            continue;
        }

        match apply(action, &mut event.data) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                error!(
                    consumer = consumer_id,
                    index,
                    action = name,
                    error = %e,
                    "Action failed, continuing with next action"
                );
                metrics::try_record_action_failed(consumer_id, name);
                report.failed.push(ActionFailure {
                    index,
                    action: name,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

fn apply(action: &ActionSpec, data: &mut Value) -> Result<(), ExpressionError> {
    match &action.kind {
        ActionKind::SetTag(tags) => set_tags(tags, action.locations.as_ref(), data),
        ActionKind::IncludeData => {
            if let Some(locations) = &action.locations {
                *data = locations.select(data);
            }
            Ok(())
        }
        ActionKind::ExcludeData => {
            if let Some(locations) = &action.locations {
                *data = locations.remove(data);
            }
            Ok(())
        }
        ActionKind::JmesPath(expression) => {
            *data = expression.search(data)?;
            Ok(())
        }
    }
}

/// A tag value computed before any mutation
enum Resolved {
    Value(Value),
    Tenant,
    Application,
}

fn set_tags(tags: &TagSet, locations: Option<&LocationSpec>, data: &mut Value) -> Result<(), ExpressionError> {
    let mut resolved = Vec::with_capacity(tags.len());
    for (name, value) in tags.iter() {
        let computed = match value {
            TagValue::Literal(literal) => Resolved::Value(literal.clone()),
            TagValue::Query(expression) => Resolved::Value(expression.search(data)?),
            TagValue::Tenant => Resolved::Tenant,
            TagValue::Application => Resolved::Application,
        };
        resolved.push((name, computed));
    }

    match locations {
        None => merge_tags(data, "", &resolved),
        Some(locations) => {
            locations.for_each_selected_mut(data, &mut |key, target| merge_tags(target, key, &resolved));
        }
    }
    Ok(())
}

fn merge_tags(target: &mut Value, key: &str, tags: &[(&str, Resolved)]) {
    let Value::Object(map) = target else {
        return;
    };
    let path = ObjectPath::parse(key);

    for (name, tag) in tags {
        let value = match tag {
            Resolved::Value(value) => value.clone(),
            Resolved::Tenant => match path.tenant {
                Some(tenant) => Value::String(tenant.to_string()),
                None => continue,
            },
            Resolved::Application => match path.application {
                Some(application) => Value::String(application.to_string()),
                None => continue,
            },
        };
        match map.get_mut(*name) {
            Some(existing @ Value::Object(_)) if value.is_object() => deep_merge(existing, value),
            _ => {
                map.insert((*name).to_string(), value);
            }
        }
    }
}

/// Tenant and application parsed from a `/Tenant/App/object` key
#[derive(Debug, Default, PartialEq)]
struct ObjectPath<'a> {
    tenant: Option<&'a str>,
    application: Option<&'a str>,
}

impl<'a> ObjectPath<'a> {
    fn parse(key: &'a str) -> Self {
        let Some(rest) = key.strip_prefix('/') else {
            return Self::default();
        };
        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            [tenant, application, _, ..] => Self {
                tenant: Some(*tenant),
                application: Some(*application),
            },
            [tenant, _] => Self {
                tenant: Some(*tenant),
                application: None,
            },
            _ => Self::default(),
        }
    }
}
