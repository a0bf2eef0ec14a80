//! Declarative action specs
//!
//! Actions arrive as JSON objects carrying exactly one action key plus
//! optional modifiers:
//!
//! ```json
//! {"setTag": {"env": "prod", "app": "`A`"}, "locations": {"Tenant": true}}
//! {"includeData": {}, "locations": {"system": true}}
//! {"excludeData": {}, "locations": {"system": {"hostname": true}}}
//! {"JMESPath": {}, "expression": "{host: system.hostname}"}
//! ```
//!
//! Each object is resolved into an [`ActionSpec`] once, when configuration
//! is loaded. Every shape problem is reported as a [`ConfigError`] at that
//! point, so processing never has to re-validate.

use crate::error::ConfigError;
use crate::location::LocationSpec;
use crate::matcher::{Condition, MatcherSpec};
use crate::query::Expression;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A resolved action
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawAction")]
pub struct ActionSpec {
    pub enable: bool,
    pub locations: Option<LocationSpec>,
    pub condition: Option<Condition>,
    pub kind: ActionKind,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    SetTag(TagSet),
    IncludeData,
    ExcludeData,
    JmesPath(Expression),
}

impl ActionKind {
    /// Name as written in configuration
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::SetTag(_) => "setTag",
            ActionKind::IncludeData => "includeData",
            ActionKind::ExcludeData => "excludeData",
            ActionKind::JmesPath(_) => "JMESPath",
        }
    }
}

impl ActionSpec {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            enable: true,
            locations: None,
            condition: None,
            kind,
        }
    }

    pub fn with_locations(mut self, locations: LocationSpec) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }

    /// Should this action run against `data`?
    pub fn applies_to(&self, data: &Value) -> bool {
        self.enable
            && self
                .condition
                .as_ref()
                .is_none_or(|condition| condition.matches(data))
    }
}

/// Ordered tag name to value pairs of a `setTag` action
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<(String, TagValue)>,
}

impl TagSet {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.tags.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn parse(map: Map<String, Value>) -> Result<Self, ConfigError> {
        let mut tags = Vec::with_capacity(map.len());
        for (name, value) in map {
            let value = TagValue::parse(&name, value)?;
            tags.push((name, value));
        }
        Ok(Self { tags })
    }
}

impl TryFrom<Value> for TagSet {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Self::parse(map),
            _ => Err(ConfigError::InvalidAction(
                "setTag expects an object of tag names to values".to_string(),
            )),
        }
    }
}

/// How a tag value is produced
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Literal(Value),
    /// `` `T` ``: tenant segment of the target location
    Tenant,
    /// `` `A` ``: application segment of the target location
    Application,
    /// Evaluated against the event data
    Query(Expression),
}

impl TagValue {
    pub fn parse(name: &str, value: Value) -> Result<Self, ConfigError> {
        let Value::String(text) = value else {
            return Ok(TagValue::Literal(value));
        };
        let compile = |source: &str| {
            Expression::compile(source).map_err(|source_err| ConfigError::InvalidTag {
                tag: name.to_string(),
                reason: source_err.to_string(),
            })
        };

        match text.as_str() {
            "`T`" => Ok(TagValue::Tenant),
            "`A`" => Ok(TagValue::Application),
            s if s.len() > 2 && s.starts_with('`') && s.ends_with('`') => {
                Ok(TagValue::Query(compile(s)?))
            }
            s => match s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
                Some(query) => Ok(TagValue::Query(compile(query.trim())?)),
                None => Ok(TagValue::Literal(Value::String(s.to_string()))),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    #[serde(default = "enabled")]
    enable: bool,
    #[serde(rename = "setTag")]
    set_tag: Option<Value>,
    #[serde(rename = "includeData")]
    include_data: Option<Value>,
    #[serde(rename = "excludeData")]
    exclude_data: Option<Value>,
    #[serde(rename = "JMESPath")]
    jmes_path: Option<Value>,
    expression: Option<String>,
    locations: Option<Value>,
    #[serde(rename = "ifAllMatch")]
    if_all_match: Option<Value>,
    #[serde(rename = "ifAnyMatch")]
    if_any_match: Option<Vec<Value>>,
}

fn enabled() -> bool {
    true
}

impl TryFrom<RawAction> for ActionSpec {
    type Error = ConfigError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let declared = [
            raw.set_tag.is_some(),
            raw.include_data.is_some(),
            raw.exclude_data.is_some(),
            raw.jmes_path.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if declared != 1 {
            return Err(ConfigError::InvalidAction(format!(
                "expected exactly one of setTag, includeData, excludeData, JMESPath; found {declared}"
            )));
        }

        let condition = match (raw.if_all_match, raw.if_any_match) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidAction(
                    "ifAllMatch and ifAnyMatch cannot be combined".to_string(),
                ));
            }
            (Some(all), None) => Some(Condition::All(MatcherSpec::try_from(all)?)),
            (None, Some(any)) => Some(Condition::Any(
                any.into_iter()
                    .map(MatcherSpec::try_from)
                    .collect::<Result<_, _>>()?,
            )),
            (None, None) => None,
        };

        let locations = raw.locations.map(LocationSpec::try_from).transpose()?;

        let kind = if let Some(tags) = raw.set_tag {
            ActionKind::SetTag(TagSet::try_from(tags)?)
        } else if raw.include_data.is_some() || raw.exclude_data.is_some() {
            if locations.is_none() {
                return Err(ConfigError::InvalidAction(
                    "includeData and excludeData require locations".to_string(),
                ));
            }
            if raw.include_data.is_some() {
                ActionKind::IncludeData
            } else {
                ActionKind::ExcludeData
            }
        } else {
            let source = raw.expression.as_deref().ok_or_else(|| {
                ConfigError::InvalidAction("JMESPath requires an expression".to_string())
            })?;
            if locations.is_some() {
                return Err(ConfigError::InvalidAction(
                    "JMESPath does not accept locations".to_string(),
                ));
            }
            let expression = Expression::compile(source).map_err(|source_err| ConfigError::Expression {
                expression: source.to_string(),
                source: source_err,
            })?;
            ActionKind::JmesPath(expression)
        };

        if raw.expression.is_some() && !matches!(kind, ActionKind::JmesPath(_)) {
            return Err(ConfigError::InvalidAction(
                "expression is only valid with JMESPath".to_string(),
            ));
        }

        Ok(ActionSpec {
            enable: raw.enable,
            locations,
            condition,
            kind,
        })
    }
}
