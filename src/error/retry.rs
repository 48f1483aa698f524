//! Retry policy description for the durable-execution engine
//!
//! The SDK does not retry by itself. A component may attach a
//! [`RetryPolicy`]; the engine maps it onto its own retry configuration and
//! matches failures on their type strings.
//!
//! # Example
//!
//! ```rust
//! use component_sdk::error::{ComponentError, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default().with_max_attempts(4);
//! let err = ComponentError::network("connection reset");
//! assert_eq!(policy.next_delay(&err, 1), Some(Duration::from_secs(1)));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::kinds::{ComponentError, ErrorKind};

/// Engine-facing retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_interval_ms: u64,
    /// Cap for computed backoff delays
    pub maximum_interval_ms: u64,
    /// Multiplier applied per attempt
    pub backoff_coefficient: f64,
    /// Type strings never retried, regardless of the error's own flag
    pub non_retryable_error_types: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 1_000,
            maximum_interval_ms: 60_000,
            backoff_coefficient: 2.0,
            non_retryable_error_types: ErrorKind::NON_RETRYABLE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient.max(1.0);
        self
    }

    /// Add a type string to the non-retryable list
    pub fn with_non_retryable(mut self, error_type: impl Into<String>) -> Self {
        let error_type = error_type.into();
        if !self.non_retryable_error_types.contains(&error_type) {
            self.non_retryable_error_types.push(error_type);
        }
        self
    }

    pub fn is_non_retryable_type(&self, error_type: &str) -> bool {
        self.non_retryable_error_types.iter().any(|t| t == error_type)
    }

    /// Whether another attempt should follow `attempt` (1-based) failing with `error`
    pub fn should_retry(&self, error: &ComponentError, attempt: u32) -> bool {
        attempt < self.max_attempts
            && error.is_retryable()
            && !self.is_non_retryable_type(error.error_type())
    }

    /// Exponential backoff for the retry following `attempt` (1-based), capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial_interval_ms as f64 * self.backoff_coefficient.powi(exponent);
        let capped = raw.min(self.maximum_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before the next attempt, or `None` when no retry should happen
    ///
    /// An explicit delay carried by the error (rate limits) wins over backoff.
    pub fn next_delay(&self, error: &ComponentError, attempt: u32) -> Option<Duration> {
        if !self.should_retry(error, attempt) {
            return None;
        }
        Some(
            error
                .retry_delay_ms()
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.backoff_delay(attempt)),
        )
    }
}
