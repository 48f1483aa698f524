//! Connection-type derivation from schema shape and metadata

use serde_json::Value;

use super::connection::{ConnectionType, PrimitiveName};
use super::meta::{effective_port_metadata, EditorHint, PortMetadata};
use super::PortError;
use crate::schema::{Schema, SchemaKind};

/// Field name used when deriving a bare schema
const ROOT_FIELD: &str = "(root)";

/// Derive the connection type of a schema
///
/// Precedence:
/// 1. explicit `connection_type` override
/// 2. wrappers are unwrapped (metadata comes from the outermost annotated layer)
/// 3. any/unknown need `allow_any` with a reason
/// 4. named contract hint
/// 5. editor hint
/// 6. primitives, enums and literals
/// 7. arrays and records recurse
/// 8. unions need an override
/// 9. anything else fails
pub fn derive_connection_type(schema: &Schema) -> Result<ConnectionType, PortError> {
    derive_field(schema, ROOT_FIELD)
}

pub(crate) fn derive_field(schema: &Schema, field: &str) -> Result<ConnectionType, PortError> {
    derive_inner(schema, field, None)
}

/// `inherited` carries the parent's any-permission into list/map elements
fn derive_inner(
    schema: &Schema,
    field: &str,
    inherited: Option<&PortMetadata>,
) -> Result<ConnectionType, PortError> {
    let meta = effective_port_metadata(schema);

    if let Some(ct) = meta.as_ref().and_then(|m| m.connection_type.clone()) {
        return Ok(ct);
    }

    let core = schema.unwrap_wrappers();

    if matches!(core.kind(), SchemaKind::Any | SchemaKind::Unknown) {
        let permitted = meta.as_ref().or(inherited).is_some_and(PortMetadata::permits_any);
        return if permitted {
            Ok(ConnectionType::Any)
        } else {
            Err(PortError::UnannotatedAny {
                field: field.to_string(),
                kind: core.kind().name(),
            })
        };
    }

    if let Some(meta) = &meta {
        if let Some(name) = &meta.schema_name {
            return Ok(ConnectionType::contract(name.clone(), meta.is_credential));
        }
        if let Some(editor) = meta.editor {
            return Ok(editor_shape(editor));
        }
    }

    // Elements inherit any-permission only when they carry no metadata of their own
    let scope = meta.as_ref().or(inherited);

    match core.kind() {
        SchemaKind::String => Ok(ConnectionType::text()),
        SchemaKind::Number { .. } => Ok(ConnectionType::number()),
        SchemaKind::Boolean => Ok(ConnectionType::boolean()),
        SchemaKind::Enum(values) => infer_from_values(values, field),
        SchemaKind::Literal(value) => infer_from_values(std::slice::from_ref(value), field),
        SchemaKind::Array(item) => Ok(ConnectionType::list(derive_inner(
            item,
            &format!("{}[]", field),
            scope,
        )?)),
        SchemaKind::Record(value) => Ok(ConnectionType::map(derive_inner(
            value,
            &format!("{}{{}}", field),
            scope,
        )?)),
        SchemaKind::Union(_) => Err(PortError::UnannotatedUnion {
            field: field.to_string(),
        }),
        other => Err(PortError::Unsupported {
            field: field.to_string(),
            kind: other.name(),
        }),
    }
}

/// Canonical connection type for an editor widget
pub fn editor_shape(editor: EditorHint) -> ConnectionType {
    match editor {
        EditorHint::Text | EditorHint::Textarea | EditorHint::Select => ConnectionType::text(),
        EditorHint::Number => ConnectionType::number(),
        EditorHint::Boolean => ConnectionType::boolean(),
        EditorHint::MultiSelect => ConnectionType::list(ConnectionType::text()),
        EditorHint::Json => ConnectionType::json(),
        EditorHint::Secret => ConnectionType::secret(),
        EditorHint::File => ConnectionType::file(),
    }
}

fn infer_from_values(values: &[Value], field: &str) -> Result<ConnectionType, PortError> {
    let mut inferred: Option<PrimitiveName> = None;
    for value in values {
        let name = match value {
            Value::String(_) => PrimitiveName::Text,
            Value::Number(_) => PrimitiveName::Number,
            Value::Bool(_) => PrimitiveName::Boolean,
            _ => {
                return Err(PortError::MixedEnum {
                    field: field.to_string(),
                })
            }
        };
        match inferred {
            None => inferred = Some(name),
            Some(existing) if existing == name => {}
            Some(_) => {
                return Err(PortError::MixedEnum {
                    field: field.to_string(),
                })
            }
        }
    }
    inferred
        .map(ConnectionType::primitive)
        .ok_or_else(|| PortError::MixedEnum {
            field: field.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::meta::PortMetadata;
    use serde_json::json;

    #[test]
    fn primitives() {
        assert_eq!(derive_connection_type(&Schema::string()).unwrap(), ConnectionType::text());
        assert_eq!(derive_connection_type(&Schema::integer()).unwrap(), ConnectionType::number());
        assert_eq!(derive_connection_type(&Schema::boolean()).unwrap(), ConnectionType::boolean());
    }

    #[test]
    fn override_wins_even_for_unions() {
        let schema = Schema::union([Schema::string(), Schema::number()])
            .with_port(PortMetadata::new("Id").connection_type(ConnectionType::text()));
        assert_eq!(derive_connection_type(&schema).unwrap(), ConnectionType::text());
    }

    #[test]
    fn unions_without_override_fail() {
        let err = derive_field(&Schema::union([Schema::string(), Schema::number()]), "id").unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn any_requires_reason() {
        assert!(matches!(
            derive_connection_type(&Schema::any()),
            Err(PortError::UnannotatedAny { .. })
        ));
        let schema = Schema::unknown().with_port(PortMetadata::new("Body").allow_any("raw payload"));
        assert_eq!(derive_connection_type(&schema).unwrap(), ConnectionType::Any);

        let mut meta = PortMetadata::new("Body");
        meta.allow_any = true;
        let schema = Schema::any().with_port(meta);
        assert!(derive_connection_type(&schema).is_err());
    }

    #[test]
    fn contract_then_editor_then_structure() {
        let schema = Schema::object([("token", Schema::string())])
            .with_port(PortMetadata::new("Creds").contract("github", true));
        assert_eq!(
            derive_connection_type(&schema).unwrap(),
            ConnectionType::contract("github", true)
        );

        let schema = Schema::string().with_port(PortMetadata::new("Key").editor(EditorHint::Secret));
        assert_eq!(derive_connection_type(&schema).unwrap(), ConnectionType::secret());

        let schema = Schema::array(Schema::string())
            .with_port(PortMetadata::new("Tags").editor(EditorHint::MultiSelect));
        assert_eq!(
            derive_connection_type(&schema).unwrap(),
            ConnectionType::list(ConnectionType::text())
        );
    }

    #[test]
    fn metadata_through_wrappers() {
        let inner = Schema::string().with_port(PortMetadata::new("Doc").editor(EditorHint::Json));
        let schema = inner.optional().nullable();
        assert_eq!(derive_connection_type(&schema).unwrap(), ConnectionType::json());
    }

    #[test]
    fn enums_and_literals() {
        assert_eq!(
            derive_connection_type(&Schema::enumeration(["a", "b"])).unwrap(),
            ConnectionType::text()
        );
        assert_eq!(
            derive_connection_type(&Schema::enumeration([json!(1), json!(2)])).unwrap(),
            ConnectionType::number()
        );
        assert_eq!(
            derive_connection_type(&Schema::literal(true)).unwrap(),
            ConnectionType::boolean()
        );
        assert!(matches!(
            derive_connection_type(&Schema::enumeration([json!("a"), json!(1)])),
            Err(PortError::MixedEnum { .. })
        ));
    }

    #[test]
    fn arrays_and_records_recurse() {
        assert_eq!(
            derive_connection_type(&Schema::array(Schema::number())).unwrap(),
            ConnectionType::list(ConnectionType::number())
        );
        assert_eq!(
            derive_connection_type(&Schema::record(Schema::array(Schema::string()))).unwrap(),
            ConnectionType::map(ConnectionType::list(ConnectionType::text()))
        );
    }

    #[test]
    fn element_any_inherits_permission() {
        let schema = Schema::array(Schema::any())
            .with_port(PortMetadata::new("Rows").allow_any("arbitrary rows"));
        assert_eq!(
            derive_connection_type(&schema).unwrap(),
            ConnectionType::list(ConnectionType::Any)
        );
        assert!(derive_field(&Schema::array(Schema::any()), "rows").is_err());
    }

    #[test]
    fn plain_objects_fail() {
        let err = derive_field(&Schema::object([("a", Schema::string())]), "config").unwrap_err();
        assert!(matches!(err, PortError::Unsupported { kind: "object", .. }));
    }

    #[test]
    fn repeated_derivation_agrees() {
        let schema = Schema::record(Schema::boolean()).optional();
        let first = derive_connection_type(&schema).unwrap();
        for _ in 0..5 {
            assert_eq!(derive_connection_type(&schema).unwrap(), first);
        }
    }
}
