//! Built-in query functions

use super::ExpressionError;
use crate::document::type_name;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Length,
    Keys,
    Values,
    Join,
    ToString,
    Merge,
    NotNull,
    Type,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "length" => Function::Length,
            "keys" => Function::Keys,
            "values" => Function::Values,
            "join" => Function::Join,
            "to_string" => Function::ToString,
            "merge" => Function::Merge,
            "not_null" => Function::NotNull,
            "type" => Function::Type,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::Keys => "keys",
            Function::Values => "values",
            Function::Join => "join",
            Function::ToString => "to_string",
            Function::Merge => "merge",
            Function::NotNull => "not_null",
            Function::Type => "type",
        }
    }

    pub(crate) fn accepts(self, count: usize) -> bool {
        match self {
            Function::Join => count == 2,
            Function::Merge | Function::NotNull => count >= 1,
            _ => count == 1,
        }
    }

    pub(crate) fn call(self, args: Vec<Value>) -> Result<Value, ExpressionError> {
        let mut args = args.into_iter();

        match self {
            Function::Length => match take(&mut args) {
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                other => Err(self.invalid("string, array or object", &other)),
            },
            Function::Keys => match take(&mut args) {
                Value::Object(map) => Ok(Value::Array(map.into_iter().map(|(k, _)| Value::String(k)).collect())),
                other => Err(self.invalid("object", &other)),
            },
            Function::Values => match take(&mut args) {
                Value::Object(map) => Ok(Value::Array(map.into_iter().map(|(_, v)| v).collect())),
                other => Err(self.invalid("object", &other)),
            },
            Function::Join => {
                let glue = match take(&mut args) {
                    Value::String(glue) => glue,
                    other => return Err(self.invalid("string", &other)),
                };
                let items = match take(&mut args) {
                    Value::Array(items) => items,
                    other => return Err(self.invalid("array of strings", &other)),
                };
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => parts.push(s),
                        other => return Err(self.invalid("array of strings", &other)),
                    }
                }
                Ok(Value::String(parts.join(&glue)))
            }
            Function::ToString => match take(&mut args) {
                Value::String(s) => Ok(Value::String(s)),
                other => Ok(Value::String(other.to_string())),
            },
            Function::Merge => {
                let mut merged = Map::new();
                for arg in args {
                    match arg {
                        Value::Object(map) => merged.extend(map),
                        other => return Err(self.invalid("object", &other)),
                    }
                }
                Ok(Value::Object(merged))
            }
            Function::NotNull => Ok(args.find(|v| !v.is_null()).unwrap_or(Value::Null)),
            Function::Type => Ok(Value::String(type_name(&take(&mut args)).to_string())),
        }
    }

    fn invalid(self, expected: &'static str, found: &Value) -> ExpressionError {
        ExpressionError::InvalidType {
            function: self.name(),
            expected,
            found: type_name(found),
        }
    }
}

fn take(args: &mut std::vec::IntoIter<Value>) -> Value {
    args.next().unwrap_or(Value::Null)
}
