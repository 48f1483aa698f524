//! Schema - identity-carrying schema nodes
//!
//! A [`Schema`] is an immutable, reference-counted node. Every constructor and
//! wrapper allocates a fresh [`SchemaId`]; clones share it. Port and parameter
//! metadata live outside the node in side tables keyed by that id
//! (see [`crate::port`]), so attaching metadata never rebuilds the schema.
//!
//! ```rust
//! use component_sdk::schema::Schema;
//! use serde_json::json;
//!
//! let inputs = Schema::object([
//!     ("url", Schema::string()),
//!     ("retries", Schema::integer().with_default(json!(3))),
//! ]);
//! let parsed = inputs.parse(&json!({"url": "https://example.com"})).unwrap();
//! assert_eq!(parsed, json!({"url": "https://example.com", "retries": 3}));
//! ```

mod parse;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

pub(crate) use parse::json_type;
pub use parse::{SchemaError, SchemaIssue};

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a schema node (stable for the node's lifetime, shared by clones)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

impl SchemaId {
    fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Value transform applied after the inner schema parsed successfully
pub type TransformFn = Arc<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Shape of a schema node
#[derive(Clone)]
pub enum SchemaKind {
    String,
    Number { integer: bool },
    Boolean,
    /// One of a fixed set of JSON values
    Enum(Vec<Value>),
    Literal(Value),
    Array(Schema),
    /// String-keyed map with uniform values
    Record(Schema),
    /// Fields in declaration order
    Object(Vec<(String, Schema)>),
    Union(Vec<Schema>),
    Any,
    Unknown,
    Optional(Schema),
    Nullable(Schema),
    Default(Schema, Value),
    Transform(Schema, TransformFn),
}

impl SchemaKind {
    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number { integer: false } => "number",
            Self::Number { integer: true } => "integer",
            Self::Boolean => "boolean",
            Self::Enum(_) => "enum",
            Self::Literal(_) => "literal",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
            Self::Object(_) => "object",
            Self::Union(_) => "union",
            Self::Any => "any",
            Self::Unknown => "unknown",
            Self::Optional(_) => "optional",
            Self::Nullable(_) => "nullable",
            Self::Default(..) => "default",
            Self::Transform(..) => "transform",
        }
    }

    /// Inner schema of a wrapper layer
    pub fn wrapped(&self) -> Option<&Schema> {
        match self {
            Self::Optional(inner)
            | Self::Nullable(inner)
            | Self::Default(inner, _)
            | Self::Transform(inner, _) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Debug for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(values) => f.debug_tuple("Enum").field(values).finish(),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Array(item) => f.debug_tuple("Array").field(item).finish(),
            Self::Record(value) => f.debug_tuple("Record").field(value).finish(),
            Self::Object(fields) => f.debug_map().entries(fields.iter().map(|(k, v)| (k, v))).finish(),
            Self::Union(variants) => f.debug_tuple("Union").field(variants).finish(),
            Self::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
            Self::Nullable(inner) => f.debug_tuple("Nullable").field(inner).finish(),
            Self::Default(inner, value) => f.debug_tuple("Default").field(inner).field(value).finish(),
            Self::Transform(inner, _) => f.debug_tuple("Transform").field(inner).finish(),
            other => f.write_str(other.name()),
        }
    }
}

struct SchemaNode {
    id: SchemaId,
    kind: SchemaKind,
}

impl Drop for SchemaNode {
    fn drop(&mut self) {
        crate::port::meta::forget_metadata(self.id);
    }
}

/// Immutable schema node handle
#[derive(Clone)]
pub struct Schema(Arc<SchemaNode>);

impl Schema {
    pub fn from_kind(kind: SchemaKind) -> Self {
        Self(Arc::new(SchemaNode {
            id: SchemaId::next(),
            kind,
        }))
    }

    // ═══════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════

    pub fn string() -> Self {
        Self::from_kind(SchemaKind::String)
    }

    pub fn number() -> Self {
        Self::from_kind(SchemaKind::Number { integer: false })
    }

    pub fn integer() -> Self {
        Self::from_kind(SchemaKind::Number { integer: true })
    }

    pub fn boolean() -> Self {
        Self::from_kind(SchemaKind::Boolean)
    }

    pub fn enumeration<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_kind(SchemaKind::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_kind(SchemaKind::Literal(value.into()))
    }

    pub fn array(item: Schema) -> Self {
        Self::from_kind(SchemaKind::Array(item))
    }

    pub fn record(value: Schema) -> Self {
        Self::from_kind(SchemaKind::Record(value))
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self::from_kind(SchemaKind::Object(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn union(variants: impl IntoIterator<Item = Schema>) -> Self {
        Self::from_kind(SchemaKind::Union(variants.into_iter().collect()))
    }

    pub fn any() -> Self {
        Self::from_kind(SchemaKind::Any)
    }

    pub fn unknown() -> Self {
        Self::from_kind(SchemaKind::Unknown)
    }

    // ═══════════════════════════════════════════
    // Wrappers (each is a new node)
    // ═══════════════════════════════════════════

    pub fn optional(self) -> Self {
        Self::from_kind(SchemaKind::Optional(self))
    }

    pub fn nullable(self) -> Self {
        Self::from_kind(SchemaKind::Nullable(self))
    }

    pub fn with_default(self, value: impl Into<Value>) -> Self {
        Self::from_kind(SchemaKind::Default(self, value.into()))
    }

    pub fn transform<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self::from_kind(SchemaKind::Transform(self, Arc::new(f)))
    }

    // ═══════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════

    pub fn id(&self) -> SchemaId {
        self.0.id
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.0.kind
    }

    /// Same node (identity, not structure)
    pub fn same_node(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Wrapper layers from the outermost inward, ending with the core node
    pub fn layers(&self) -> impl Iterator<Item = &Schema> {
        std::iter::successors(Some(self), |s| s.kind().wrapped())
    }

    /// Core node with optional/nullable/default/transform layers removed
    pub fn unwrap_wrappers(&self) -> &Schema {
        let mut current = self;
        while let Some(inner) = current.kind().wrapped() {
            current = inner;
        }
        current
    }

    /// A value may be omitted (optional or defaulted somewhere in the wrappers)
    pub fn is_optional(&self) -> bool {
        self.layers()
            .any(|s| matches!(s.kind(), SchemaKind::Optional(_) | SchemaKind::Default(..)))
    }

    /// Outermost default value, if any
    pub fn default_value(&self) -> Option<&Value> {
        self.layers().find_map(|s| match s.kind() {
            SchemaKind::Default(_, value) => Some(value),
            _ => None,
        })
    }

    /// Object fields of the core node
    pub fn fields(&self) -> Option<&[(String, Schema)]> {
        match self.unwrap_wrappers().kind() {
            SchemaKind::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up an object field by name
    pub fn field(&self, name: &str) -> Option<&Schema> {
        self.fields()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, schema)| schema)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema#{}(", self.0.id.0)?;
        self.0.kind.fmt(f)?;
        f.write_str(")")
    }
}
