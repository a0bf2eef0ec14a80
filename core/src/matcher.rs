//! Condition matching against event data
//!
//! A matcher spec is a structural pattern over the document. Keys are
//! literals or patterns. Leaves are expected values: non-string JSON is
//! compared for equality, strings match by equality or as a regular
//! expression searched for in the data's text.
//!
//! A matcher key is satisfied when at least one matching document key has
//! a value satisfying the nested matcher. All keys of a matcher must be
//! satisfied.

use crate::document::{type_name, values_equal};
use crate::error::ConfigError;
use crate::keys::KeyMatcher;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Structural pattern over a document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct MatcherSpec {
    entries: Vec<(KeyMatcher, MatcherNode)>,
}

#[derive(Debug, Clone)]
pub enum MatcherNode {
    Expect(Expected),
    Branch(MatcherSpec),
}

/// Expected leaf value
#[derive(Debug, Clone)]
pub enum Expected {
    /// Numbers, booleans, null
    Literal(Value),
    /// Equality, or a match of the pattern anywhere in the text
    Text { raw: String, pattern: Option<Regex> },
}

impl MatcherSpec {
    /// Does `data` satisfy every key of this spec?
    pub fn matches(&self, data: &Value) -> bool {
        let Value::Object(map) = data else {
            return self.entries.is_empty();
        };
        self.entries.iter().all(|(key, node)| {
            map.iter()
                .filter(|(candidate, _)| key.matches(candidate))
                .any(|(_, value)| node.matches(value))
        })
    }

    fn parse(value: &Value, path: &str) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::InvalidMatcher {
                path: path.to_string(),
                reason: format!("expected an object, found {}", type_name(value)),
            });
        };
        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            let child_path = format!("{path}.{key}");
            let node = match value {
                Value::Object(_) => MatcherNode::Branch(Self::parse(value, &child_path)?),
                Value::Array(_) => {
                    return Err(ConfigError::InvalidMatcher {
                        path: child_path,
                        reason: "arrays cannot be matched".to_string(),
                    });
                }
                Value::String(raw) => MatcherNode::Expect(Expected::text(raw)),
                other => MatcherNode::Expect(Expected::Literal(other.clone())),
            };
            entries.push((KeyMatcher::parse(key), node));
        }
        Ok(Self { entries })
    }
}

impl TryFrom<Value> for MatcherSpec {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value, "matcher")
    }
}

impl MatcherNode {
    fn matches(&self, value: &Value) -> bool {
        match self {
            MatcherNode::Expect(expected) => expected.matches(value),
            MatcherNode::Branch(spec) => spec.matches(value),
        }
    }
}

impl Expected {
    pub fn text(raw: &str) -> Self {
        Expected::Text {
            raw: raw.to_string(),
            pattern: Regex::new(raw).ok(),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Expected::Literal(expected) => values_equal(expected, value),
            Expected::Text { raw, pattern } => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(_) | Value::Bool(_) => value.to_string(),
                    _ => return false,
                };
                text == *raw || pattern.as_ref().is_some_and(|p| p.is_match(&text))
            }
        }
    }
}

/// Gate on an action
#[derive(Debug, Clone)]
pub enum Condition {
    /// `ifAllMatch`: the single spec must match
    All(MatcherSpec),
    /// `ifAnyMatch`: at least one spec must match
    Any(Vec<MatcherSpec>),
}

impl Condition {
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Condition::All(spec) => spec.matches(data),
            Condition::Any(specs) => specs.iter().any(|spec| spec.matches(data)),
        }
    }
}
