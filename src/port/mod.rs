//! Ports - typed connection points of a component
//!
//! - [`meta`]: port/parameter metadata side tables keyed by schema identity
//! - [`ConnectionType`]: derived port type, compatibility, coercion
//! - [`extract_ports`] / [`extract_parameters`]: editor-facing descriptors
//! - [`validate_component_schema`]: registration-time check

mod connection;
mod derive;
mod extract;
pub mod meta;

use thiserror::Error;

pub use connection::{can_connect, coerce, CoercionError, ConnectionType, PrimitiveName};
pub use derive::{derive_connection_type, editor_shape};
pub use extract::{
    extract_parameters, extract_ports, validate_component_schema, ParameterDescriptor,
    PortDescriptor,
};
pub use meta::{
    merge_port_metadata, param_metadata, port_metadata, set_param_metadata, set_port_metadata,
    BindingType, EditorHint, ParamMetadata, PortMetadata, ValuePriority,
};

/// Declaration problem in a port or parameter schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("Field '{field}' is an unannotated {kind} type; set allow_any with a reason")]
    UnannotatedAny { field: String, kind: &'static str },

    #[error("Field '{field}' is a union; declare an explicit connection type")]
    UnannotatedUnion { field: String },

    #[error("Field '{field}' is an enum or literal with mixed value types")]
    MixedEnum { field: String },

    #[error("Field '{field}' has unsupported schema type '{kind}'; add a contract name or explicit connection type")]
    Unsupported { field: String, kind: &'static str },

    #[error("Field '{field}' has no port metadata")]
    MissingPortMetadata { field: String },

    #[error("Field '{field}' has no parameter metadata")]
    MissingParamMetadata { field: String },

    #[error("Port schema must be an object, got '{kind}'")]
    NotAnObject { kind: &'static str },
}

impl PortError {
    /// Field the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnannotatedAny { field, .. }
            | Self::UnannotatedUnion { field }
            | Self::MixedEnum { field }
            | Self::Unsupported { field, .. }
            | Self::MissingPortMetadata { field }
            | Self::MissingParamMetadata { field } => Some(field),
            Self::NotAnObject { .. } => None,
        }
    }
}
