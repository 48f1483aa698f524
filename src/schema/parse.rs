//! Validation and normalization of JSON values against a [`Schema`]

use serde_json::{Map, Value};
use thiserror::Error;

use super::{Schema, SchemaKind};
use crate::error::{ComponentError, FieldErrors};

/// Path key used for issues on the root value
const ROOT_PATH: &str = "(root)";

/// A single validation failure at a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Dotted path with `[i]` indices, empty for the root
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    fn display_path(&self) -> &str {
        if self.path.is_empty() {
            ROOT_PATH
        } else {
            &self.path
        }
    }
}

/// Every issue found while parsing one value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.issues))]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

fn summarize(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.display_path(), i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<SchemaError> for ComponentError {
    fn from(err: SchemaError) -> Self {
        let mut fields = FieldErrors::new();
        for issue in &err.issues {
            fields
                .entry(issue.display_path().to_string())
                .or_default()
                .push(issue.message.clone());
        }
        ComponentError::validation(format!("Validation failed: {}", err), fields)
    }
}

impl Schema {
    /// Validate `value` and return the normalized result
    ///
    /// Defaults are applied, unknown object keys dropped and transforms run.
    /// All issues are collected rather than stopping at the first.
    pub fn parse(&self, value: &Value) -> Result<Value, SchemaError> {
        let mut issues = Vec::new();
        let out = parse_node(self, Some(value), "", &mut issues);
        if issues.is_empty() {
            Ok(out.unwrap_or(Value::Null))
        } else {
            Err(SchemaError { issues })
        }
    }

    /// Like [`Schema::parse`] but for a possibly absent value
    pub fn parse_optional(&self, value: Option<&Value>) -> Result<Option<Value>, SchemaError> {
        let mut issues = Vec::new();
        let out = parse_node(self, value, "", &mut issues);
        if issues.is_empty() {
            Ok(out)
        } else {
            Err(SchemaError { issues })
        }
    }
}

/// `None` input means absent; `None` output means "omit from parent".
fn parse_node(
    schema: &Schema,
    value: Option<&Value>,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<Value> {
    let issue = |issues: &mut Vec<SchemaIssue>, message: String| {
        issues.push(SchemaIssue {
            path: path.to_string(),
            message,
        });
    };

    match schema.kind() {
        // ─────────────────────────────────────────
        // Wrappers
        // ─────────────────────────────────────────
        SchemaKind::Optional(inner) => match value {
            None | Some(Value::Null) => None,
            Some(v) => parse_node(inner, Some(v), path, issues),
        },
        SchemaKind::Nullable(inner) => match value {
            Some(Value::Null) => Some(Value::Null),
            other => parse_node(inner, other, path, issues),
        },
        SchemaKind::Default(inner, default) => match value {
            None | Some(Value::Null) => Some(default.clone()),
            Some(v) => parse_node(inner, Some(v), path, issues),
        },
        SchemaKind::Transform(inner, f) => {
            let before = issues.len();
            let parsed = parse_node(inner, value, path, issues)?;
            if issues.len() > before {
                return None;
            }
            match f(parsed) {
                Ok(v) => Some(v),
                Err(message) => {
                    issue(issues, message);
                    None
                }
            }
        }

        SchemaKind::Any | SchemaKind::Unknown => value.cloned(),

        _ => {
            let Some(value) = value else {
                issue(issues, "Required".to_string());
                return None;
            };
            parse_present(schema, value, path, issues)
        }
    }
}

fn parse_present(
    schema: &Schema,
    value: &Value,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<Value> {
    let mismatch = |issues: &mut Vec<SchemaIssue>, expected: &str| {
        issues.push(SchemaIssue {
            path: path.to_string(),
            message: format!("Expected {}, received {}", expected, json_type(value)),
        });
        None
    };

    match schema.kind() {
        SchemaKind::String => match value {
            Value::String(_) => Some(value.clone()),
            _ => mismatch(issues, "string"),
        },
        SchemaKind::Number { integer } => match value {
            Value::Number(n) if !integer || is_integral(n) => Some(value.clone()),
            Value::Number(_) => mismatch(issues, "integer"),
            _ => mismatch(issues, "number"),
        },
        SchemaKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            _ => mismatch(issues, "boolean"),
        },
        SchemaKind::Enum(options) => {
            if options.contains(value) {
                Some(value.clone())
            } else {
                let expected = options
                    .iter()
                    .map(|o| o.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ");
                issues.push(SchemaIssue {
                    path: path.to_string(),
                    message: format!("Invalid enum value. Expected {}, received {}", expected, value),
                });
                None
            }
        }
        SchemaKind::Literal(expected) => {
            if expected == value {
                Some(value.clone())
            } else {
                issues.push(SchemaIssue {
                    path: path.to_string(),
                    message: format!("Invalid literal value, expected {}", expected),
                });
                None
            }
        }
        SchemaKind::Array(item) => {
            let Value::Array(elements) = value else {
                return mismatch(issues, "array");
            };
            let out = elements
                .iter()
                .enumerate()
                .map(|(i, element)| {
                    let child = format!("{}[{}]", path, i);
                    parse_node(item, Some(element), &child, issues).unwrap_or(Value::Null)
                })
                .collect();
            Some(Value::Array(out))
        }
        SchemaKind::Record(inner) => {
            let Value::Object(entries) = value else {
                return mismatch(issues, "object");
            };
            let mut out = Map::new();
            for (key, entry) in entries {
                let child = join_path(path, key);
                if let Some(v) = parse_node(inner, Some(entry), &child, issues) {
                    out.insert(key.clone(), v);
                }
            }
            Some(Value::Object(out))
        }
        SchemaKind::Object(fields) => {
            let Value::Object(entries) = value else {
                return mismatch(issues, "object");
            };
            let mut out = Map::new();
            for (name, field) in fields {
                let child = join_path(path, name);
                if let Some(v) = parse_node(field, entries.get(name), &child, issues) {
                    out.insert(name.clone(), v);
                }
            }
            Some(Value::Object(out))
        }
        SchemaKind::Union(variants) => {
            for variant in variants {
                let mut scratch = Vec::new();
                let out = parse_node(variant, Some(value), path, &mut scratch);
                if scratch.is_empty() {
                    return out;
                }
            }
            issues.push(SchemaIssue {
                path: path.to_string(),
                message: format!("Invalid input: no union variant matched {}", json_type(value)),
            });
            None
        }
        // Wrappers and any/unknown are handled in parse_node
        _ => Some(value.clone()),
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
