//! Port and parameter descriptors for the workflow editor

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::connection::ConnectionType;
use super::derive::derive_field;
use super::meta::{
    effective_param_metadata, effective_port_metadata, BindingType, EditorHint, SelectOption,
    ValuePriority,
};
use super::PortError;
use crate::schema::Schema;

/// One input or output port
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub connection_type: ConnectionType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_type: Option<BindingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_priority: Option<ValuePriority>,
    pub branching: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_color: Option<String>,
}

/// One configuration parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub id: String,
    pub label: String,
    pub editor: EditorHint,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<BTreeMap<String, Value>>,
}

fn object_fields(schema: &Schema) -> Result<&[(String, Schema)], PortError> {
    schema.fields().ok_or_else(|| PortError::NotAnObject {
        kind: schema.unwrap_wrappers().kind().name(),
    })
}

/// Ports for every annotated field, in declaration order
///
/// Fields without port metadata are skipped; use
/// [`validate_component_schema`] to reject them.
pub fn extract_ports(schema: &Schema) -> Result<Vec<PortDescriptor>, PortError> {
    let mut ports = Vec::new();
    for (name, field) in object_fields(schema)? {
        let Some(meta) = effective_port_metadata(field) else {
            continue;
        };
        let connection_type = derive_field(field, name)?;
        ports.push(PortDescriptor {
            id: name.clone(),
            label: meta.label.unwrap_or_else(|| name.clone()),
            description: meta.description,
            connection_type,
            required: !field.is_optional(),
            binding_type: meta.binding_type,
            editor: meta.editor,
            value_priority: meta.value_priority,
            branching: meta.branching,
            branch_color: meta.branch_color,
        });
    }
    Ok(ports)
}

/// Parameters for every field; each one must carry parameter metadata
pub fn extract_parameters(schema: &Schema) -> Result<Vec<ParameterDescriptor>, PortError> {
    object_fields(schema)?
        .iter()
        .map(|(name, field)| -> Result<ParameterDescriptor, PortError> {
            let meta = effective_param_metadata(field).ok_or_else(|| {
                PortError::MissingParamMetadata {
                    field: name.clone(),
                }
            })?;
            Ok(ParameterDescriptor {
                id: name.clone(),
                label: meta.label,
                editor: meta.editor,
                required: !field.is_optional(),
                default_value: field.default_value().cloned(),
                description: meta.description,
                placeholder: meta.placeholder,
                options: meta.options,
                min: meta.min,
                max: meta.max,
                rows: meta.rows,
                help_text: meta.help_text,
                visible_when: meta.visible_when,
            })
        })
        .collect()
}

/// Every field carries port metadata and derives a connection type
pub fn validate_component_schema(schema: &Schema) -> Result<(), PortError> {
    for (name, field) in object_fields(schema)? {
        if effective_port_metadata(field).is_none() {
            return Err(PortError::MissingPortMetadata {
                field: name.clone(),
            });
        }
        derive_field(field, name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::meta::{ParamMetadata, PortMetadata};
    use serde_json::json;

    #[test]
    fn ports_in_declaration_order() {
        let schema = Schema::object([
            (
                "zeta",
                Schema::string().with_port(PortMetadata::new("Zeta")),
            ),
            (
                "alpha",
                Schema::number()
                    .optional()
                    .with_port(PortMetadata::new("Alpha").priority(ValuePriority::ConnectionFirst)),
            ),
            ("internal", Schema::string()),
        ]);
        let ports = extract_ports(&schema).unwrap();
        let ids: Vec<_> = ports.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert!(ports[0].required);
        assert!(!ports[1].required);
        assert_eq!(ports[1].value_priority, Some(ValuePriority::ConnectionFirst));
    }

    #[test]
    fn descriptor_wire_shape() {
        let schema = Schema::object([(
            "ok",
            Schema::boolean().with_port(PortMetadata::new("OK").branching(Some("green"))),
        )]);
        let wire = serde_json::to_value(&extract_ports(&schema).unwrap()[0]).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": "ok",
                "label": "OK",
                "connectionType": {"kind": "primitive", "name": "boolean"},
                "required": true,
                "branching": true,
                "branchColor": "green"
            })
        );
    }

    #[test]
    fn validate_requires_metadata() {
        let schema = Schema::object([("x", Schema::string())]);
        assert!(matches!(
            validate_component_schema(&schema),
            Err(PortError::MissingPortMetadata { .. })
        ));
    }

    #[test]
    fn validate_rejects_unannotated_any_and_accepts_annotated() {
        let bad = Schema::object([("body", Schema::any().with_port(PortMetadata::new("Body")))]);
        assert!(validate_component_schema(&bad).is_err());

        let good = Schema::object([(
            "body",
            Schema::any().with_port(PortMetadata::new("Body").allow_any("webhook payload")),
        )]);
        assert!(validate_component_schema(&good).is_ok());
    }

    #[test]
    fn non_object_schema_is_rejected() {
        assert!(matches!(
            validate_component_schema(&Schema::string()),
            Err(PortError::NotAnObject { kind: "string" })
        ));
    }

    #[test]
    fn parameters_carry_defaults() {
        let schema = Schema::object([(
            "method",
            Schema::enumeration(["GET", "POST"])
                .with_param(ParamMetadata::new("Method", EditorHint::Select))
                .with_default("GET"),
        )]);
        let params = extract_parameters(&schema).unwrap();
        assert_eq!(params[0].default_value, Some(json!("GET")));
        assert!(!params[0].required);
    }

    #[test]
    fn parameters_require_metadata() {
        let schema = Schema::object([("x", Schema::string())]);
        assert!(matches!(
            extract_parameters(&schema),
            Err(PortError::MissingParamMetadata { .. })
        ));
    }
}
