//! Trace events and the per-invocation scoping wrapper
//!
//! Components never build a full [`TraceEvent`]; they hand a
//! [`TraceEventKind`] to [`ScopedTrace::record`], which stamps the run id,
//! node reference, timestamp and frozen invocation metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metadata::ExecutionContextMetadata;
use crate::error::ErrorPayload;
use crate::http::har::{HarEntry, HarRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `{ message, name }` pair for errors that are not classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub message: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TraceEventKind {
    // ═══════════════════════════════════════════
    // NODE LIFECYCLE
    // ═══════════════════════════════════════════
    NodeStarted,
    NodeCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_summary: Option<Value>,
    },
    NodeFailed {
        error: ErrorPayload,
    },
    NodeProgress {
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    AwaitingInput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    NodeSkipped {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // ═══════════════════════════════════════════
    // HTTP
    // ═══════════════════════════════════════════
    HttpRequestSent {
        correlation_id: String,
        request: HarRequest,
    },
    HttpResponseReceived {
        correlation_id: String,
        har: HarEntry,
    },
    HttpRequestError {
        correlation_id: String,
        request: HarRequest,
        error: ErrorSummary,
    },
}

impl TraceEventKind {
    /// Wire name of the variant (`NODE_STARTED`, ...)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NodeStarted => "NODE_STARTED",
            Self::NodeCompleted { .. } => "NODE_COMPLETED",
            Self::NodeFailed { .. } => "NODE_FAILED",
            Self::NodeProgress { .. } => "NODE_PROGRESS",
            Self::AwaitingInput { .. } => "AWAITING_INPUT",
            Self::NodeSkipped { .. } => "NODE_SKIPPED",
            Self::HttpRequestSent { .. } => "HTTP_REQUEST_SENT",
            Self::HttpResponseReceived { .. } => "HTTP_RESPONSE_RECEIVED",
            Self::HttpRequestError { .. } => "HTTP_REQUEST_ERROR",
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::HttpRequestSent { correlation_id, .. }
            | Self::HttpResponseReceived { correlation_id, .. }
            | Self::HttpRequestError { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub run_id: String,
    pub node_ref: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TraceEventKind,
    pub context: Arc<ExecutionContextMetadata>,
}

/// Receiver of trace events (fire-and-forget)
pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// Trace sink bound to one invocation
#[derive(Clone)]
pub struct ScopedTrace {
    sink: Arc<dyn TraceSink>,
    metadata: Arc<ExecutionContextMetadata>,
}

impl ScopedTrace {
    pub fn new(sink: Arc<dyn TraceSink>, metadata: Arc<ExecutionContextMetadata>) -> Self {
        Self { sink, metadata }
    }

    pub fn record(&self, kind: TraceEventKind) {
        self.sink.record(TraceEvent {
            run_id: self.metadata.run_id.clone(),
            node_ref: self.metadata.component_ref.clone(),
            timestamp: Utc::now(),
            kind,
            context: Arc::clone(&self.metadata),
        });
    }

    pub fn metadata(&self) -> &ExecutionContextMetadata {
        &self.metadata
    }
}

impl std::fmt::Debug for ScopedTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedTrace")
            .field("run_id", &self.metadata.run_id)
            .field("node_ref", &self.metadata.component_ref)
            .finish()
    }
}
