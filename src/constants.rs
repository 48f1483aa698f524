//! Centralized constants for the component runtime
//!
//! Container contract paths, size caps and timeouts in one place.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Container I/O contract
// ═══════════════════════════════════════════════════════════════

/// Mount point of the per-invocation scratch directory inside the container
pub const CONTAINER_IO_DIR: &str = "/component-io";

/// File the runner writes the serialized payload to
pub const INPUT_FILE_NAME: &str = "input.json";

/// File the container is expected to write its JSON output to
pub const OUTPUT_FILE_NAME: &str = "output.json";

/// Env var naming the input file path inside the container
pub const INPUT_PATH_ENV: &str = "COMPONENT_INPUT_PATH";

/// Env var naming the output file path inside the container
pub const OUTPUT_PATH_ENV: &str = "COMPONENT_OUTPUT_PATH";

/// Prefix for scratch directories and container names
pub const SCRATCH_PREFIX: &str = "component-run-";

// ═══════════════════════════════════════════════════════════════
// Docker runner limits
// ═══════════════════════════════════════════════════════════════

/// Default container timeout when the runner config leaves it at zero
pub const DEFAULT_DOCKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Stderr lines up to this length are forwarded as progress events
pub const STDERR_PROGRESS_MAX_LEN: usize = 200;

/// Tail of stderr kept in container error details
pub const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Preview of a malformed output file kept in error details
pub const OUTPUT_PREVIEW_BYTES: usize = 512;

/// How long to wait for stream readers after the process has exited
pub const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound for the best-effort `docker kill` after a timeout
pub const CONTAINER_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// PTY geometry reported to the container
pub const PTY_ROWS: u16 = 40;
pub const PTY_COLS: u16 = 120;

/// Read buffer for PTY and stdio streams
pub const STREAM_READ_BUFFER: usize = 8 * 1024;

// ═══════════════════════════════════════════════════════════════
// HTTP instrumentation limits
// ═══════════════════════════════════════════════════════════════

/// Request bodies larger than this are truncated in HAR entries
pub const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 10 * 1024;

/// Response bodies larger than this are truncated in HAR entries
pub const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 50 * 1024;

/// Replacement for masked header and query values
pub const MASKED_VALUE: &str = "[REDACTED]";

// ═══════════════════════════════════════════════════════════════
// Error taxonomy defaults
// ═══════════════════════════════════════════════════════════════

/// Retry delay for rate limits without a usable header
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 60_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_paths_are_absolute() {
        assert!(CONTAINER_IO_DIR.starts_with('/'));
        assert!(!INPUT_FILE_NAME.contains('/'));
        assert!(!OUTPUT_FILE_NAME.contains('/'));
        assert_ne!(INPUT_FILE_NAME, OUTPUT_FILE_NAME);
    }

    #[test]
    fn response_cap_exceeds_request_cap() {
        assert!(DEFAULT_MAX_RESPONSE_BODY_BYTES > DEFAULT_MAX_REQUEST_BODY_BYTES);
        assert_eq!(DEFAULT_MAX_REQUEST_BODY_BYTES, 10 * 1024);
        assert_eq!(DEFAULT_MAX_RESPONSE_BODY_BYTES, 50 * 1024);
    }

    #[test]
    fn timeouts_are_positive() {
        assert!(DEFAULT_DOCKER_TIMEOUT.as_secs() > 0);
        assert!(CONTAINER_KILL_TIMEOUT > READER_DRAIN_TIMEOUT);
    }
}
