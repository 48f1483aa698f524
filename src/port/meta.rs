//! Port and parameter metadata, stored outside schema nodes
//!
//! Metadata is keyed by [`SchemaId`] in process-wide side tables. Attaching
//! metadata to a node replaces whatever was there; [`merge_port_metadata`]
//! is the explicit opt-in for layering. Entries go away when the last
//! handle to their node is dropped.

use std::collections::BTreeMap;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::connection::ConnectionType;
use crate::schema::{Schema, SchemaId};

static PORT_METADATA: Lazy<DashMap<SchemaId, PortMetadata>> = Lazy::new(DashMap::new);
static PARAM_METADATA: Lazy<DashMap<SchemaId, ParamMetadata>> = Lazy::new(DashMap::new);

// ═══════════════════════════════════════════
// Hints
// ═══════════════════════════════════════════

/// How the UI should bind a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingType {
    Credential,
    Action,
    Config,
}

/// Editor widget for a port or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorHint {
    Text,
    Textarea,
    Number,
    Boolean,
    Select,
    MultiSelect,
    Json,
    Secret,
    File,
}

/// Which value wins when a port has both a manual value and a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValuePriority {
    ManualFirst,
    ConnectionFirst,
}

// ═══════════════════════════════════════════
// PortMetadata
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_type: Option<BindingType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_priority: Option<ValuePriority>,
    #[serde(default)]
    pub branching: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_color: Option<String>,
    /// Explicit override, wins over every derivation rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    /// Named contract hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub is_credential: bool,
    #[serde(default)]
    pub allow_any: bool,
    /// Required alongside `allow_any`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PortMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn binding(mut self, binding: BindingType) -> Self {
        self.binding_type = Some(binding);
        self
    }

    pub fn editor(mut self, editor: EditorHint) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn priority(mut self, priority: ValuePriority) -> Self {
        self.value_priority = Some(priority);
        self
    }

    pub fn branching(mut self, color: Option<&str>) -> Self {
        self.branching = true;
        self.branch_color = color.map(str::to_string);
        self
    }

    pub fn connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }

    pub fn contract(mut self, name: impl Into<String>, credential: bool) -> Self {
        self.schema_name = Some(name.into());
        self.is_credential = credential;
        self
    }

    pub fn allow_any(mut self, reason: impl Into<String>) -> Self {
        self.allow_any = true;
        self.reason = Some(reason.into());
        self
    }

    /// `allow_any` with a non-blank reason
    pub fn permits_any(&self) -> bool {
        self.allow_any && self.reason.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    /// Layer `overlay` on top of `self`: set fields in the overlay win
    pub fn merged(self, overlay: PortMetadata) -> Self {
        Self {
            label: overlay.label.or(self.label),
            description: overlay.description.or(self.description),
            binding_type: overlay.binding_type.or(self.binding_type),
            editor: overlay.editor.or(self.editor),
            value_priority: overlay.value_priority.or(self.value_priority),
            branching: overlay.branching || self.branching,
            branch_color: overlay.branch_color.or(self.branch_color),
            connection_type: overlay.connection_type.or(self.connection_type),
            schema_name: overlay.schema_name.or(self.schema_name),
            is_credential: overlay.is_credential || self.is_credential,
            allow_any: overlay.allow_any || self.allow_any,
            reason: overlay.reason.or(self.reason),
        }
    }
}

// ═══════════════════════════════════════════
// ParamMetadata
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamMetadata {
    pub label: String,
    pub editor: EditorHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Show only when every named parameter equals the given value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<BTreeMap<String, Value>>,
}

impl ParamMetadata {
    pub fn new(label: impl Into<String>, editor: EditorHint) -> Self {
        Self {
            label: label.into(),
            editor,
            description: None,
            placeholder: None,
            options: Vec::new(),
            min: None,
            max: None,
            rows: None,
            help_text: None,
            visible_when: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn option(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.push(SelectOption {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn visible_when(mut self, param: impl Into<String>, value: impl Into<Value>) -> Self {
        self.visible_when
            .get_or_insert_with(BTreeMap::new)
            .insert(param.into(), value.into());
        self
    }
}

// ═══════════════════════════════════════════
// Side-table access
// ═══════════════════════════════════════════

/// Attach port metadata to exactly this node, replacing any previous value
pub fn set_port_metadata(schema: &Schema, meta: PortMetadata) {
    PORT_METADATA.insert(schema.id(), meta);
}

/// Metadata attached to exactly this node
pub fn port_metadata(schema: &Schema) -> Option<PortMetadata> {
    PORT_METADATA.get(&schema.id()).map(|m| m.clone())
}

/// Layer `overlay` over the node's current metadata and store the result
pub fn merge_port_metadata(schema: &Schema, overlay: PortMetadata) -> PortMetadata {
    let mut entry = PORT_METADATA.entry(schema.id()).or_default();
    let merged = std::mem::take(entry.value_mut()).merged(overlay);
    *entry.value_mut() = merged.clone();
    merged
}

/// Metadata on the outermost annotated wrapper layer
pub fn effective_port_metadata(schema: &Schema) -> Option<PortMetadata> {
    schema.layers().find_map(port_metadata)
}

pub fn set_param_metadata(schema: &Schema, meta: ParamMetadata) {
    PARAM_METADATA.insert(schema.id(), meta);
}

pub fn param_metadata(schema: &Schema) -> Option<ParamMetadata> {
    PARAM_METADATA.get(&schema.id()).map(|m| m.clone())
}

pub fn effective_param_metadata(schema: &Schema) -> Option<ParamMetadata> {
    schema.layers().find_map(param_metadata)
}

/// Remove both entries for a node that is going away
///
/// Called from the node's `Drop`; metadata values never own a `Schema`, so
/// no table guard is held while this runs.
pub(crate) fn forget_metadata(id: SchemaId) {
    PORT_METADATA.remove(&id);
    PARAM_METADATA.remove(&id);
}

impl Schema {
    /// Attach port metadata and return the same node
    pub fn with_port(self, meta: PortMetadata) -> Self {
        set_port_metadata(&self, meta);
        self
    }

    /// Attach parameter metadata and return the same node
    pub fn with_param(self, meta: ParamMetadata) -> Self {
        set_param_metadata(&self, meta);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_replaces() {
        let schema = Schema::string()
            .with_port(PortMetadata::new("First").description("one"));
        set_port_metadata(&schema, PortMetadata::new("Second"));

        let meta = port_metadata(&schema).unwrap();
        assert_eq!(meta.label.as_deref(), Some("Second"));
        assert_eq!(meta.description, None);
    }

    #[test]
    fn explicit_merge_layers() {
        let schema = Schema::string().with_port(PortMetadata::new("Token").description("API token"));
        let merged = merge_port_metadata(
            &schema,
            PortMetadata::default().binding(BindingType::Credential),
        );
        assert_eq!(merged.label.as_deref(), Some("Token"));
        assert_eq!(merged.binding_type, Some(BindingType::Credential));
        assert_eq!(port_metadata(&schema), Some(merged));
    }

    #[test]
    fn identity_not_structure() {
        let a = Schema::string().with_port(PortMetadata::new("A"));
        let b = Schema::string();
        assert!(port_metadata(&a).is_some());
        assert!(port_metadata(&b).is_none());
        assert!(port_metadata(&a.clone()).is_some());
    }

    #[test]
    fn outermost_annotated_layer_wins() {
        let inner = Schema::string().with_port(PortMetadata::new("Inner"));
        let outer = inner.clone().optional();
        assert_eq!(effective_port_metadata(&outer).unwrap().label.as_deref(), Some("Inner"));

        let outer = outer.with_port(PortMetadata::new("Outer"));
        assert_eq!(effective_port_metadata(&outer).unwrap().label.as_deref(), Some("Outer"));
    }

    #[test]
    fn dropped_nodes_leave_no_entries() {
        let inner = Schema::string().with_param(ParamMetadata::new("Name", EditorHint::Text));
        let inner_id = inner.id();
        let outer = inner.optional().with_port(PortMetadata::new("Name"));
        let outer_id = outer.id();

        let kept = outer.clone();
        drop(outer);
        assert!(PORT_METADATA.contains_key(&outer_id));

        drop(kept);
        assert!(!PORT_METADATA.contains_key(&outer_id));
        assert!(!PARAM_METADATA.contains_key(&inner_id));
    }

    #[test]
    fn permits_any_needs_reason() {
        let mut meta = PortMetadata::new("Payload").allow_any("free-form webhook body");
        assert!(meta.permits_any());
        meta.reason = Some("   ".into());
        assert!(!meta.permits_any());
    }

    #[test]
    fn param_metadata_roundtrip() {
        let schema = Schema::string().with_param(
            ParamMetadata::new("Method", EditorHint::Select)
                .option("GET", "GET")
                .option("POST", "POST")
                .visible_when("mode", "advanced"),
        );
        let meta = effective_param_metadata(&schema.optional()).unwrap();
        assert_eq!(meta.options.len(), 2);
        let wire = serde_json::to_value(&meta).unwrap();
        assert_eq!(wire["editor"], "select");
        assert_eq!(wire["visibleWhen"]["mode"], "advanced");
    }
}
