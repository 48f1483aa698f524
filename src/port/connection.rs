//! Connection types, compatibility and runtime coercion

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::error::{ComponentError, FieldErrors};
use crate::schema::{json_type, SchemaIssue};

/// Primitive connection type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveName {
    Text,
    Number,
    Boolean,
    Secret,
    Json,
    File,
}

impl PrimitiveName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Secret => "secret",
            Self::Json => "json",
            Self::File => "file",
        }
    }

    /// Declared coercions between distinct primitives
    pub fn coerces_to(self, target: PrimitiveName) -> bool {
        matches!(
            (self, target),
            (Self::Number, Self::Text)
                | (Self::Boolean, Self::Text)
                | (Self::Text, Self::Number)
                | (Self::Text, Self::Boolean)
                | (Self::Text, Self::Secret)
        )
    }
}

/// Type of a port as seen by the graph editor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionType {
    Primitive {
        name: PrimitiveName,
    },
    Contract {
        name: String,
        #[serde(default)]
        credential: bool,
    },
    List {
        element: Box<ConnectionType>,
    },
    Map {
        element: Box<ConnectionType>,
    },
    Any,
}

impl ConnectionType {
    pub fn primitive(name: PrimitiveName) -> Self {
        Self::Primitive { name }
    }

    pub fn text() -> Self {
        Self::primitive(PrimitiveName::Text)
    }

    pub fn number() -> Self {
        Self::primitive(PrimitiveName::Number)
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveName::Boolean)
    }

    pub fn secret() -> Self {
        Self::primitive(PrimitiveName::Secret)
    }

    pub fn json() -> Self {
        Self::primitive(PrimitiveName::Json)
    }

    pub fn file() -> Self {
        Self::primitive(PrimitiveName::File)
    }

    pub fn contract(name: impl Into<String>, credential: bool) -> Self {
        Self::Contract {
            name: name.into(),
            credential,
        }
    }

    pub fn list(element: ConnectionType) -> Self {
        Self::List {
            element: Box::new(element),
        }
    }

    pub fn map(element: ConnectionType) -> Self {
        Self::Map {
            element: Box::new(element),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name } => f.write_str(name.as_str()),
            Self::Contract {
                name,
                credential: false,
            } => write!(f, "contract:{}", name),
            Self::Contract {
                name,
                credential: true,
            } => write!(f, "contract:{}(credential)", name),
            Self::List { element } => write!(f, "list<{}>", element),
            Self::Map { element } => write!(f, "map<{}>", element),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Whether an output of type `source` may feed an input of type `target`
pub fn can_connect(source: &ConnectionType, target: &ConnectionType) -> bool {
    use ConnectionType as C;
    match (source, target) {
        (C::Any, _) | (_, C::Any) => true,
        (C::Primitive { name: s }, C::Primitive { name: t }) => s == t || s.coerces_to(*t),
        (
            C::Contract {
                name: sn,
                credential: sc,
            },
            C::Contract {
                name: tn,
                credential: tc,
            },
        ) => sn == tn && sc == tc,
        (C::List { element: s }, C::List { element: t })
        | (C::Map { element: s }, C::Map { element: t }) => can_connect(s, t),
        _ => false,
    }
}

// ═══════════════════════════════════════════
// Coercion
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot coerce value at '{path}' to {expected}: {reason}")]
pub struct CoercionError {
    /// `[i]` / `.key` path into the value, empty at the root
    pub path: String,
    pub expected: String,
    pub reason: String,
}

impl CoercionError {
    pub fn issue(&self) -> SchemaIssue {
        SchemaIssue {
            path: self.path.clone(),
            message: format!("expected {}: {}", self.expected, self.reason),
        }
    }
}

impl From<CoercionError> for ComponentError {
    fn from(err: CoercionError) -> Self {
        let field = if err.path.is_empty() {
            "(root)".to_string()
        } else {
            err.path.clone()
        };
        let mut fields = FieldErrors::new();
        fields.insert(field, vec![err.reason.clone()]);
        ComponentError::validation(err.to_string(), fields)
    }
}

/// Convert `value` to the runtime shape of `connection_type`
///
/// Null passes through for every type. List and map coercion is element-wise
/// and fails on the first failing element.
pub fn coerce(connection_type: &ConnectionType, value: Value) -> Result<Value, CoercionError> {
    coerce_at(connection_type, value, "")
}

fn coerce_at(ct: &ConnectionType, value: Value, path: &str) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(value);
    }
    let fail = |reason: String| CoercionError {
        path: path.to_string(),
        expected: ct.to_string(),
        reason,
    };

    match ct {
        ConnectionType::Any | ConnectionType::Contract { .. } => Ok(value),
        ConnectionType::Primitive { name } => match (*name, value) {
            (PrimitiveName::Json, v) => Ok(v),

            (PrimitiveName::Text, Value::String(s)) => Ok(Value::String(s)),
            (PrimitiveName::Text, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (PrimitiveName::Text, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (PrimitiveName::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (PrimitiveName::Number, Value::String(s)) => parse_number(&s)
                .map(Value::Number)
                .ok_or_else(|| fail(format!("'{}' is not a number", s))),

            (PrimitiveName::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (PrimitiveName::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail(format!("'{}' is not a boolean", s))),
            },

            (PrimitiveName::Secret, Value::String(s)) => Ok(Value::String(s)),
            (PrimitiveName::Secret, v @ (Value::Object(_) | Value::Array(_))) => {
                serde_json::to_string(&v)
                    .map(Value::String)
                    .map_err(|e| fail(e.to_string()))
            }

            (PrimitiveName::File, v @ (Value::String(_) | Value::Object(_))) => Ok(v),

            (_, other) => Err(fail(format!("received {}", json_type(&other)))),
        },
        ConnectionType::List { element } => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| coerce_at(element, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(fail(format!("received {}", json_type(&other)))),
        },
        ConnectionType::Map { element } => match value {
            Value::Object(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    out.insert(key, coerce_at(element, item, &child)?);
                }
                Ok(Value::Object(out))
            }
            other => Err(fail(format!("received {}", json_type(&other)))),
        },
    }
}

/// Integral strings become integers; other finite numerics become floats
fn parse_number(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}
