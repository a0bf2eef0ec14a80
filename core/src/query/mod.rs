//! Query expressions over documents
//!
//! A JMESPath subset used by `setTag` values (`${...}`) and `JMESPath`
//! actions. Supported forms:
//!
//! - identifiers, quoted identifiers and dotted sub-expressions: `a.b."c-d"`
//! - indexes, including negative ones: `a[0]`, `a[-1]`
//! - list and object projections: `a[*].b`, `a.*.b`
//! - flatten: `a[].b`
//! - multi-select: `[a, b]`, `{x: a, y: b}`
//! - pipes: `a[*].b | [0]`
//! - literals: `` `{"json": true}` ``, `'raw string'`, `@`
//! - functions: `length`, `keys`, `values`, `join`, `to_string`, `merge`,
//!   `not_null`, `type`
//!
//! Expressions are compiled once with [`Expression::compile`] and
//! evaluated many times with [`Expression::search`]. Evaluation never
//! mutates its input.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use telemux_core::query::Expression;
//!
//! let expr = Expression::compile("items[*].name").unwrap();
//! let doc = json!({"items": [{"name": "a"}, {"name": "b"}]});
//! assert_eq!(expr.search(&doc).unwrap(), json!(["a", "b"]));
//! ```

mod functions;
mod lexer;
mod parser;

use parser::Ast;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Failure to compile or evaluate an expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("unterminated literal starting at position {position}")]
    Unterminated { position: usize },

    #[error("invalid literal at position {position}: {reason}")]
    InvalidLiteral { position: usize, reason: String },

    #[error("unexpected token {found} at position {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("unexpected end of expression at position {position}")]
    UnexpectedEnd { position: usize },

    #[error("empty expression")]
    Empty,

    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { position: usize, name: String },

    #[error("function '{name}' does not accept {given} argument(s)")]
    Arity { name: &'static str, given: usize },

    /// Raised during evaluation, never at compile time
    #[error("function '{function}' expected {expected}, found {found}")]
    InvalidType {
        function: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// A compiled query expression
#[derive(Clone)]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    /// Parse `source` into a reusable expression
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.to_string(),
            ast: parser::parse(source)?,
        })
    }

    /// Evaluate against `document`
    ///
    /// Missing paths yield `null`, not an error.
    pub fn search(&self, document: &Value) -> Result<Value, ExpressionError> {
        eval(&self.ast, document)
    }

    /// The source text this expression was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compile and evaluate in one step
pub fn evaluate(expression: &str, document: &Value) -> Result<Value, ExpressionError> {
    Expression::compile(expression)?.search(document)
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Expression::compile(&source).map_err(serde::de::Error::custom)
    }
}

fn eval(ast: &Ast, input: &Value) -> Result<Value, ExpressionError> {
    match ast {
        Ast::Identity => Ok(input.clone()),
        Ast::Field(name) => Ok(input.get(name).cloned().unwrap_or(Value::Null)),
        Ast::Index(index) => {
            let Value::Array(items) = input else {
                return Ok(Value::Null);
            };
            let resolved = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)
            } else {
                Some(*index as usize)
            };
            Ok(resolved
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        Ast::Literal(value) => Ok(value.clone()),
        Ast::Subexpr(lhs, rhs) | Ast::Pipe(lhs, rhs) => {
            let left = eval(lhs, input)?;
            eval(rhs, &left)
        }
        Ast::MultiList(items) => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            let values = items
                .iter()
                .map(|item| eval(item, input))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
        Ast::MultiHash(pairs) => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            let mut map = Map::new();
            for (key, expr) in pairs {
                map.insert(key.clone(), eval(expr, input)?);
            }
            Ok(Value::Object(map))
        }
        Ast::ListProjection(lhs, rhs) => match eval(lhs, input)? {
            Value::Array(items) => project(items, rhs),
            _ => Ok(Value::Null),
        },
        Ast::ObjectProjection(lhs, rhs) => match eval(lhs, input)? {
            Value::Object(map) => project(map.into_iter().map(|(_, v)| v), rhs),
            _ => Ok(Value::Null),
        },
        Ast::Flatten(inner) => match eval(inner, input)? {
            Value::Array(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Array(nested) => flat.extend(nested),
                        other => flat.push(other),
                    }
                }
                Ok(Value::Array(flat))
            }
            _ => Ok(Value::Null),
        },
        Ast::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, input))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(values)
        }
    }
}

fn project(items: impl IntoIterator<Item = Value>, rhs: &Ast) -> Result<Value, ExpressionError> {
    let mut out = Vec::new();
    for item in items {
        let value = eval(rhs, &item)?;
        if !value.is_null() {
            out.push(value);
        }
    }
    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "a": {"b": {"c": 42}},
            "people": [
                {"name": "ann", "age": 31, "tags": ["x", "y"]},
                {"name": "bob", "age": 17, "tags": ["z"]},
                {"age": 5}
            ],
            "regions": {"eu": {"hosts": 3}, "us": {"hosts": 5}},
            "weird-key": true
        })
    }

    #[test]
    fn nested_path() {
        assert_eq!(evaluate("a.b.c", &doc()).unwrap(), json!(42));
    }

    #[test]
    fn missing_path_is_null() {
        assert_eq!(evaluate("a.x.y", &doc()).unwrap(), Value::Null);
        assert_eq!(evaluate("people[10]", &doc()).unwrap(), Value::Null);
    }

    #[test]
    fn negative_index() {
        assert_eq!(evaluate("people[-1].age", &doc()).unwrap(), json!(5));
    }

    #[test]
    fn list_projection_skips_nulls() {
        assert_eq!(
            evaluate("people[*].name", &doc()).unwrap(),
            json!(["ann", "bob"])
        );
    }

    #[test]
    fn object_projection() {
        assert_eq!(
            evaluate("regions.*.hosts", &doc()).unwrap(),
            json!([3, 5])
        );
    }

    #[test]
    fn flatten_then_project() {
        assert_eq!(
            evaluate("people[].tags[]", &doc()).unwrap(),
            json!(["x", "y", "z"])
        );
    }

    #[test]
    fn pipe_resets_projection() {
        assert_eq!(evaluate("people[*].name | [0]", &doc()).unwrap(), json!("ann"));
    }

    #[test]
    fn multi_select_hash_reshapes() {
        assert_eq!(
            evaluate("{first: people[0].name, eu: regions.eu.hosts}", &doc()).unwrap(),
            json!({"first": "ann", "eu": 3})
        );
    }

    #[test]
    fn quoted_identifier() {
        assert_eq!(evaluate("\"weird-key\"", &doc()).unwrap(), json!(true));
    }

    #[test]
    fn literals_ignore_input() {
        assert_eq!(evaluate("`{\"k\": [1]}`", &doc()).unwrap(), json!({"k": [1]}));
        assert_eq!(evaluate("'text'", &doc()).unwrap(), json!("text"));
        assert_eq!(evaluate("`T`", &doc()).unwrap(), json!("T"));
    }

    #[test]
    fn functions() {
        assert_eq!(evaluate("length(people)", &doc()).unwrap(), json!(3));
        assert_eq!(evaluate("keys(regions)", &doc()).unwrap(), json!(["eu", "us"]));
        assert_eq!(
            evaluate("join(',', people[*].name)", &doc()).unwrap(),
            json!("ann,bob")
        );
        assert_eq!(evaluate("to_string(a.b.c)", &doc()).unwrap(), json!("42"));
        assert_eq!(evaluate("type(people)", &doc()).unwrap(), json!("array"));
    }

    #[test]
    fn runtime_type_error() {
        assert!(matches!(
            evaluate("length(a.b.c)", &doc()),
            Err(ExpressionError::InvalidType { function: "length", .. })
        ));
    }

    #[test]
    fn syntax_error() {
        assert!(Expression::compile("a[").is_err());
        assert!(Expression::compile("a..b").is_err());
    }

    #[test]
    fn search_does_not_mutate() {
        let original = doc();
        let copy = original.clone();
        let expr = Expression::compile("merge(a, regions)").unwrap();
        expr.search(&original).unwrap();
        assert_eq!(original, copy);
    }

    #[test]
    fn deserializes_from_source_text() {
        let expr: Expression = serde_json::from_value(json!("a.b")).unwrap();
        assert_eq!(expr.as_str(), "a.b");
        assert!(serde_json::from_value::<Expression>(json!("a[")).is_err());
    }
}
