//! ComponentError - the failure taxonomy handed to the durable engine
//!
//! Every failure a component (or the runner) reports is one of twelve kinds.
//! The kind decides retryability; the type string returned by
//! [`ComponentError::error_type`] is what retry configuration matches on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_RATE_LIMIT_DELAY_MS;

/// Shared, clonable error cause
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Per-field validation messages, keyed by field path
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error kind with its kind-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // ═══════════════════════════════════════════
    // RETRYABLE
    // ═══════════════════════════════════════════
    /// DNS, connection refused/reset, socket errors
    Network,
    /// Upstream throttling; `None` means "use the default delay"
    RateLimit { retry_after_ms: Option<u64> },
    /// Upstream 5xx or unclassified failure
    Service { status_code: Option<u16> },
    /// Operation exceeded its duration budget
    Timeout { timeout_ms: Option<u64> },
    /// A dependency is temporarily unavailable (queue full, lock held, ...)
    ResourceUnavailable { resource: Option<String> },

    // ═══════════════════════════════════════════
    // NON-RETRYABLE
    // ═══════════════════════════════════════════
    Authentication,
    NotFound { resource: Option<String> },
    Validation { field_errors: FieldErrors },
    Configuration { key: Option<String> },
    Permission,
    /// Bad image, non-zero exit, spawn failure, malformed output file
    Container { exit_code: Option<i32> },
    /// Capability declared but not available in this build/deployment
    NotImplemented,
}

impl ErrorKind {
    /// Type strings of every retryable kind
    pub const RETRYABLE_TYPES: [&'static str; 5] = [
        "NetworkError",
        "RateLimitError",
        "ServiceError",
        "TimeoutError",
        "ResourceUnavailableError",
    ];

    /// Type strings of every non-retryable kind
    pub const NON_RETRYABLE_TYPES: [&'static str; 7] = [
        "AuthenticationError",
        "NotFoundError",
        "ValidationError",
        "ConfigurationError",
        "PermissionError",
        "ContainerError",
        "NotImplementedError",
    ];

    /// Stable type discriminant (the engine contract)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Network => "NetworkError",
            Self::RateLimit { .. } => "RateLimitError",
            Self::Service { .. } => "ServiceError",
            Self::Timeout { .. } => "TimeoutError",
            Self::ResourceUnavailable { .. } => "ResourceUnavailableError",
            Self::Authentication => "AuthenticationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Validation { .. } => "ValidationError",
            Self::Configuration { .. } => "ConfigurationError",
            Self::Permission => "PermissionError",
            Self::Container { .. } => "ContainerError",
            Self::NotImplemented => "NotImplementedError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network
            | Self::RateLimit { .. }
            | Self::Service { .. }
            | Self::Timeout { .. }
            | Self::ResourceUnavailable { .. } => true,
            Self::Authentication
            | Self::NotFound { .. }
            | Self::Validation { .. }
            | Self::Configuration { .. }
            | Self::Permission
            | Self::Container { .. }
            | Self::NotImplemented => false,
        }
    }
}

/// A classified component failure
#[derive(Clone)]
pub struct ComponentError {
    kind: ErrorKind,
    message: String,
    details: Option<Map<String, Value>>,
    cause: Option<ErrorCause>,
}

impl ComponentError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Constructors, one per kind
    // ─────────────────────────────────────────────────────────────

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::new(ErrorKind::RateLimit { retry_after_ms }, message)
    }

    pub fn service(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::new(ErrorKind::Service { status_code }, message)
    }

    pub fn timeout(message: impl Into<String>, timeout_ms: Option<u64>) -> Self {
        Self::new(ErrorKind::Timeout { timeout_ms }, message)
    }

    pub fn resource_unavailable(message: impl Into<String>, resource: Option<String>) -> Self {
        Self::new(ErrorKind::ResourceUnavailable { resource }, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn not_found(message: impl Into<String>, resource: Option<String>) -> Self {
        Self::new(ErrorKind::NotFound { resource }, message)
    }

    pub fn validation(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::new(ErrorKind::Validation { field_errors }, message)
    }

    /// Validation failure for a single field
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        let reason = reason.into();
        let message = format!("{}: {}", field, reason);
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field, vec![reason]);
        Self::validation(message, field_errors)
    }

    pub fn configuration(message: impl Into<String>, key: Option<String>) -> Self {
        Self::new(ErrorKind::Configuration { key }, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn container(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::new(ErrorKind::Container { exit_code }, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    // ─────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────

    /// Replace the details object
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    /// Add a single detail entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub(crate) fn with_shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Same kind/details/cause with a new message
    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn error_type(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Explicit retry delay; only rate limits carry one
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match &self.kind {
            ErrorKind::RateLimit { retry_after_ms } => {
                Some(retry_after_ms.unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS))
            }
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match &self.kind {
            ErrorKind::Validation { field_errors } => Some(field_errors),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Container { exit_code } => *exit_code,
            _ => None,
        }
    }

    /// Wire shape for the durable engine and trace sinks
    pub fn to_payload(&self) -> ErrorPayload {
        let mut details = self.details.clone().unwrap_or_default();
        match &self.kind {
            ErrorKind::Service {
                status_code: Some(code),
            } => {
                details.insert("statusCode".into(), Value::from(*code));
            }
            ErrorKind::Timeout {
                timeout_ms: Some(ms),
            } => {
                details.insert("timeoutMs".into(), Value::from(*ms));
            }
            ErrorKind::ResourceUnavailable {
                resource: Some(resource),
            }
            | ErrorKind::NotFound {
                resource: Some(resource),
            } => {
                details.insert("resource".into(), Value::from(resource.clone()));
            }
            ErrorKind::Validation { field_errors } if !field_errors.is_empty() => {
                details.insert(
                    "fieldErrors".into(),
                    serde_json::to_value(field_errors).unwrap_or(Value::Null),
                );
            }
            ErrorKind::Configuration { key: Some(key) } => {
                details.insert("key".into(), Value::from(key.clone()));
            }
            ErrorKind::Container {
                exit_code: Some(code),
            } => {
                details.insert("exitCode".into(), Value::from(*code));
            }
            _ => {}
        }

        ErrorPayload {
            error_type: self.error_type().to_string(),
            message: self.message.clone(),
            retryable: self.is_retryable(),
            retry_delay_ms: self.retry_delay_ms(),
            details: (!details.is_empty()).then_some(Value::Object(details)),
            cause: self.cause.as_ref().map(|c| c.to_string()),
        }
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentError")
            .field("type", &self.error_type())
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("details", &self.details)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Serialized error as recorded in traces and handed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}
