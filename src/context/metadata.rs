//! Invocation identity, frozen once the context is built

use serde::{Deserialize, Serialize};

/// How a node with several upstream branches decides to start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    #[default]
    All,
    Any,
    First,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub message: String,
    pub name: String,
}

/// Upstream failure that triggered this invocation (error-handler nodes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMetadata {
    /// Node reference where the failure happened
    pub at: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextMetadata {
    pub run_id: String,
    pub component_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_strategy: Option<JoinStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureMetadata>,
}

fn first_attempt() -> u32 {
    1
}

impl ExecutionContextMetadata {
    pub fn new(run_id: impl Into<String>, component_ref: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            component_ref: component_ref.into(),
            activity_id: None,
            attempt: first_attempt(),
            correlation_id: None,
            stream_id: None,
            join_strategy: None,
            triggered_by: None,
            failure: None,
        }
    }

    pub fn with_activity(mut self, activity_id: impl Into<String>, attempt: u32) -> Self {
        self.activity_id = Some(activity_id.into());
        self.attempt = attempt.max(1);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn with_join_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.join_strategy = Some(strategy);
        self
    }

    pub fn with_triggered_by(mut self, node_ref: impl Into<String>) -> Self {
        self.triggered_by = Some(node_ref.into());
        self
    }

    pub fn with_failure(
        mut self,
        at: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.failure = Some(FailureMetadata {
            at: at.into(),
            reason: FailureReason {
                message: message.into(),
                name: name.into(),
            },
        });
        self
    }
}
