//! Location specs: which parts of a document an action touches
//!
//! A location spec mirrors the shape of the document it applies to.
//! Each key is a literal or a pattern (see [`KeyMatcher`]), and each
//! value is either `true` (take everything under this key) or a nested
//! spec. `false` leaves are accepted and ignored.
//!
//! ```json
//! { "Tenant": { "App.*": { "cpu": true } } }
//! ```
//!
//! Arrays in the document are opaque leaves: a spec can select an array
//! as a whole but never index into one.

use crate::document::type_name;
use crate::error::ConfigError;
use crate::keys::KeyMatcher;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A parsed location spec
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct LocationSpec {
    entries: Vec<(KeyMatcher, LocationNode)>,
}

/// What a location key maps to
#[derive(Debug, Clone, PartialEq)]
pub enum LocationNode {
    /// `true`: the whole subtree
    Select,
    /// Descend further
    Branch(LocationSpec),
}

enum Resolution<'a> {
    Unmatched,
    Whole,
    Nested(Vec<&'a LocationSpec>),
}

impl LocationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, builder style
    pub fn with(mut self, key: &str, node: LocationNode) -> Self {
        self.entries.push((KeyMatcher::parse(key), node));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the selected portion of `document`
    ///
    /// Intermediate objects that end up with nothing selected are omitted.
    /// Returns an empty object when nothing matches.
    pub fn select(&self, document: &Value) -> Value {
        select_in(&[self], document).unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Copy of `document` with the selected portion removed
    ///
    /// Intermediate objects stay in place even when emptied.
    pub fn remove(&self, document: &Value) -> Value {
        remove_in(&[self], document)
    }

    /// Visit every selected subtree in place
    ///
    /// The callback receives the document key and a mutable handle on its
    /// value.
    pub fn for_each_selected_mut(&self, document: &mut Value, f: &mut dyn FnMut(&str, &mut Value)) {
        visit_in(&[self], document, f);
    }

    fn parse(value: &Value, path: &str) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::InvalidLocation {
                path: path.to_string(),
                reason: format!("expected an object, found {}", type_name(value)),
            });
        };

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            let child_path = format!("{path}.{key}");
            let node = match value {
                Value::Bool(true) => LocationNode::Select,
                Value::Bool(false) => continue,
                Value::Object(_) => LocationNode::Branch(Self::parse(value, &child_path)?),
                other => {
                    return Err(ConfigError::InvalidLocation {
                        path: child_path,
                        reason: format!("expected true, false or an object, found {}", type_name(other)),
                    });
                }
            };
            entries.push((KeyMatcher::parse(key), node));
        }
        Ok(Self { entries })
    }
}

impl TryFrom<Value> for LocationSpec {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value, "locations")
    }
}

impl TryFrom<&Value> for LocationSpec {
    type Error = ConfigError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::parse(value, "locations")
    }
}

/// Combine every spec entry that matches `key`
///
/// Several patterns may match one key. A `true` among them wins;
/// otherwise all nested specs apply together.
fn resolve<'a>(specs: &[&'a LocationSpec], key: &str) -> Resolution<'a> {
    let mut nested = Vec::new();
    let mut matched = false;
    for spec in specs {
        for (matcher, node) in &spec.entries {
            if !matcher.matches(key) {
                continue;
            }
            matched = true;
            match node {
                LocationNode::Select => return Resolution::Whole,
                LocationNode::Branch(child) => nested.push(child),
            }
        }
    }
    if matched {
        Resolution::Nested(nested)
    } else {
        Resolution::Unmatched
    }
}

fn select_in(specs: &[&LocationSpec], document: &Value) -> Option<Value> {
    let Value::Object(map) = document else {
        return None;
    };
    let mut out = Map::new();
    for (key, value) in map {
        match resolve(specs, key) {
            Resolution::Unmatched => {}
            Resolution::Whole => {
                out.insert(key.clone(), value.clone());
            }
            Resolution::Nested(children) => {
                if let Some(selected) = select_in(&children, value) {
                    out.insert(key.clone(), selected);
                }
            }
        }
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

fn remove_in(specs: &[&LocationSpec], document: &Value) -> Value {
    let Value::Object(map) = document else {
        return document.clone();
    };
    let mut out = Map::new();
    for (key, value) in map {
        match resolve(specs, key) {
            Resolution::Unmatched => {
                out.insert(key.clone(), value.clone());
            }
            Resolution::Whole => {}
            Resolution::Nested(children) => {
                out.insert(key.clone(), remove_in(&children, value));
            }
        }
    }
    Value::Object(out)
}

fn visit_in(specs: &[&LocationSpec], document: &mut Value, f: &mut dyn FnMut(&str, &mut Value)) {
    let Value::Object(map) = document else {
        return;
    };
    for (key, value) in map.iter_mut() {
        match resolve(specs, key) {
            Resolution::Unmatched => {}
            Resolution::Whole => f(key, value),
            Resolution::Nested(children) => visit_in(&children, value, f),
        }
    }
}
