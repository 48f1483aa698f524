//! Classification of raw failures into the error taxonomy
//!
//! - HTTP status codes (with rate-limit header parsing)
//! - Arbitrary `std::error::Error` values by message pattern
//! - `reqwest::Error` using the client's own flags first

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde_json::Value;

use super::kinds::{ComponentError, ErrorCause, ErrorKind, FieldErrors};
use crate::http::Masker;

/// Max characters of a response body kept in the error message
const BODY_EXCERPT_CHARS: usize = 500;

/// Epoch seconds above this are treated as absolute reset timestamps
const EPOCH_THRESHOLD_SECS: u64 = 1_000_000_000;

static NETWORK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(enotfound|econnrefused|econnreset|econnaborted|ehostunreach|enetunreach|eai_again|epipe|\bdns\b|getaddrinfo|name resolution|failed to lookup|connection (refused|reset|closed|aborted)|socket hang up|broken pipe|network|unreachable)",
    )
    .expect("static regex")
});

static TIMEOUT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(timed ?out|timeout|etimedout|abort(ed)?|deadline exceeded)")
        .expect("static regex")
});

impl ComponentError {
    /// Classify a non-success HTTP response
    pub fn from_http_response(
        status: u16,
        status_text: &str,
        headers: &HeaderMap,
        body: Option<&str>,
    ) -> Self {
        let mut message = if status_text.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {} {}", status, status_text)
        };
        let excerpt = body.map(excerpt).filter(|b| !b.is_empty());
        if let Some(excerpt) = &excerpt {
            message.push_str(": ");
            message.push_str(excerpt);
        }

        let kind = match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Permission,
            404 => ErrorKind::NotFound { resource: None },
            408 => ErrorKind::Timeout { timeout_ms: None },
            429 => ErrorKind::RateLimit {
                retry_after_ms: parse_retry_delay_ms(headers, Utc::now()),
            },
            400 | 409 | 422 => ErrorKind::Validation {
                field_errors: FieldErrors::new(),
            },
            500 | 502 | 503 | 504 => ErrorKind::Service {
                status_code: Some(status),
            },
            400..=499 => ErrorKind::Validation {
                field_errors: FieldErrors::new(),
            },
            500..=599 => ErrorKind::Service {
                status_code: Some(status),
            },
            _ => ErrorKind::Service {
                status_code: Some(status),
            },
        };

        let mut err = ComponentError::new(kind, message)
            .with_detail("statusCode", status)
            .with_detail("statusText", status_text);
        if let Some(excerpt) = excerpt {
            err = err.with_detail("body", Value::String(excerpt));
        }
        err
    }

    /// Classify an arbitrary error by its message chain
    ///
    /// An error that already is a `ComponentError` is returned unchanged.
    pub fn from_error(
        error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
        context: Option<&str>,
    ) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = error.into();
        let boxed = match boxed.downcast::<ComponentError>() {
            Ok(existing) => return *existing,
            Err(other) => other,
        };

        let chain = message_chain(boxed.as_ref());
        let kind = classify_message(&chain);
        let message = with_context(context, &boxed.to_string());
        let cause: ErrorCause = boxed.into();

        ComponentError::new(kind, message).with_shared_cause(cause)
    }

    /// Classify a reqwest failure, trusting its timeout/connect flags first
    ///
    /// The request URL is masked in the message and removed from the cause.
    pub fn from_reqwest(error: reqwest::Error, context: Option<&str>) -> Self {
        let message = with_context(context, &Masker::default().error_message(&error));
        let error = error.without_url();

        if error.is_timeout() {
            return ComponentError::timeout(message, None).with_cause(error);
        }
        if error.is_connect() {
            return ComponentError::network(message).with_cause(error);
        }
        if let Some(status) = error.status() {
            let classified = ComponentError::from_http_response(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                &HeaderMap::new(),
                None,
            );
            return classified.with_message(message).with_cause(error);
        }

        ComponentError::from_error(error, context).with_message(message)
    }
}

fn classify_message(text: &str) -> ErrorKind {
    if NETWORK_PATTERN.is_match(text) {
        ErrorKind::Network
    } else if TIMEOUT_PATTERN.is_match(text) {
        ErrorKind::Timeout { timeout_ms: None }
    } else {
        ErrorKind::Service { status_code: None }
    }
}

fn message_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

fn with_context(context: Option<&str>, message: &str) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{}: {}", ctx, message),
        _ => message.to_string(),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{}…", cut)
    }
}

/// Derive a retry delay from rate-limit headers
///
/// Checks `Retry-After` (seconds or HTTP-date), then `X-RateLimit-Reset` /
/// `RateLimit-Reset` (epoch seconds or delta seconds).
pub fn parse_retry_delay_ms(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    if let Some(value) = header_str(headers, "retry-after") {
        if let Ok(secs) = value.parse::<f64>() {
            if secs.is_finite() && secs >= 0.0 {
                return Some((secs * 1000.0).round() as u64);
            }
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(value) {
            let delta = date.with_timezone(&Utc) - now;
            return Some(delta.num_milliseconds().max(0) as u64);
        }
    }

    for name in ["x-ratelimit-reset", "ratelimit-reset"] {
        if let Some(secs) = header_str(headers, name).and_then(|v| v.parse::<u64>().ok()) {
            if secs > EPOCH_THRESHOLD_SECS {
                let now_secs = now.timestamp().max(0) as u64;
                return Some(secs.saturating_sub(now_secs) * 1000);
            }
            return Some(secs * 1000);
        }
    }

    None
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
