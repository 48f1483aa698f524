//! Error types
//!
//! - [`ComponentError`]: classified failure of a component invocation
//!   (12 kinds, retryable or terminal), the contract with the durable engine
//! - [`SdkError`]: failures of the SDK itself (config, registry, IO)
//!
//! Error code ranges for [`SdkError`]:
//! - SDK-000-009: Configuration errors
//! - SDK-010-019: Registry errors
//! - SDK-020-029: Port/schema declaration errors
//! - SDK-090-099: IO/serialization errors

mod classify;
mod kinds;
mod retry;

use miette::Diagnostic;
use thiserror::Error;

use crate::port::PortError;

pub use classify::parse_retry_delay_ms;
pub use kinds::{ComponentError, ErrorCause, ErrorKind, ErrorPayload, FieldErrors};
pub use retry::RetryPolicy;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Error, Debug, Diagnostic)]
pub enum SdkError {
    // ═══════════════════════════════════════════
    // CONFIGURATION (000-009)
    // ═══════════════════════════════════════════
    #[error("[SDK-001] Invalid configuration: {reason}")]
    #[diagnostic(
        code(sdk::config_error),
        help("Check ~/.config/component-sdk/config.toml and COMPONENT_SDK_* variables")
    )]
    Config { reason: String },

    // ═══════════════════════════════════════════
    // REGISTRY (010-019)
    // ═══════════════════════════════════════════
    #[error("[SDK-010] Component '{id}' is already registered")]
    #[diagnostic(
        code(sdk::duplicate_component),
        help("Component ids are unique; clear the registry or pick a new id")
    )]
    DuplicateComponent { id: String },

    #[error("[SDK-011] Component id must not be empty")]
    #[diagnostic(code(sdk::empty_component_id))]
    EmptyComponentId,

    #[error("[SDK-012] Component '{id}' has an invalid {section} schema: {source}")]
    #[diagnostic(
        code(sdk::invalid_component_schema),
        help("Every input/output field needs port metadata; any/union fields need allow_any+reason or an explicit connection type")
    )]
    InvalidComponentSchema {
        id: String,
        section: &'static str,
        #[source]
        source: PortError,
    },

    // ═══════════════════════════════════════════
    // PORTS (020-029)
    // ═══════════════════════════════════════════
    #[error("[SDK-020] {0}")]
    #[diagnostic(code(sdk::port_error))]
    Port(#[from] PortError),

    // ═══════════════════════════════════════════
    // IO (090-099)
    // ═══════════════════════════════════════════
    #[error("[SDK-090] IO error: {0}")]
    #[diagnostic(code(sdk::io_error))]
    Io(#[from] std::io::Error),

    #[error("[SDK-091] JSON error: {0}")]
    #[diagnostic(code(sdk::json_error))]
    Json(#[from] serde_json::Error),

    #[error("[SDK-092] {0}")]
    #[diagnostic(code(sdk::component_error))]
    Component(#[from] ComponentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_appear_in_messages() {
        let err = SdkError::DuplicateComponent {
            id: "core.http".into(),
        };
        assert_eq!(
            err.to_string(),
            "[SDK-010] Component 'core.http' is already registered"
        );

        let err = SdkError::Config {
            reason: "bad toml".into(),
        };
        assert!(err.to_string().contains("SDK-001"));
    }

    #[test]
    fn component_error_converts() {
        let err: SdkError = ComponentError::permission("denied").into();
        assert!(matches!(err, SdkError::Component(_)));
        assert!(err.to_string().ends_with("denied"));
    }
}
