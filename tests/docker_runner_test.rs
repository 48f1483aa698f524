//! # Docker Runner Tests
//!
//! Drives the Docker runner against a fake `docker` binary: a shell script
//! that skips the `docker run` flags, maps `/component-io` onto the host
//! scratch dir and execs the container command directly. Covers:
//! - stdout fallback, output file, stdin payload
//! - exit codes, timeouts, missing binaries
//! - stream forwarding and PTY chunks
//!
//! Tests against a real daemon live behind the `docker-tests` feature.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use component_sdk::component::{execute_fn, ExecutionPayload};
use component_sdk::config::SdkConfig;
use component_sdk::context::{
    create_execution_context, ExecutionContext, ExecutionContextOptions, LogStream,
    MemoryLogCollector, MemoryTerminalCollector, MemoryTraceSink, TerminalStream,
};
use component_sdk::error::ErrorKind;
use component_sdk::runner::{DockerRunnerConfig, Runner, RunnerConfig};
use serde_json::{json, Value};
use serial_test::serial;
use tempfile::TempDir;

// ============================================================================
// TEST HELPERS
// ============================================================================

const FAKE_DOCKER: &str = r#"#!/bin/sh
if [ "$1" = "kill" ]; then
  exit 0
fi
shift
SCRATCH=""
while [ $# -gt 0 ]; do
  case "$1" in
    --rm|-i|-t) shift ;;
    --name|--network|--platform|--entrypoint) shift 2 ;;
    -v)
      case "$2" in
        *:/component-io) SCRATCH="${2%:/component-io}" ;;
      esac
      shift 2 ;;
    -e) export "$2"; shift 2 ;;
    *) break ;;
  esac
done
if [ -n "$SCRATCH" ]; then
  export COMPONENT_INPUT_PATH="$SCRATCH/input.json"
  export COMPONENT_OUTPUT_PATH="$SCRATCH/output.json"
fi
shift
exec "$@"
"#;

struct Harness {
    _dir: TempDir,
    runner: Runner,
    scratch_root: PathBuf,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let binary = dir.path().join("docker");
    std::fs::write(&binary, FAKE_DOCKER).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    let scratch_root = dir.path().join("scratch");
    let mut settings = SdkConfig::default();
    settings.docker.binary = binary.to_string_lossy().into_owned();
    settings.docker.scratch_root = Some(scratch_root.clone());

    Harness {
        _dir: dir,
        runner: Runner::new(settings),
        scratch_root,
    }
}

fn context() -> (ExecutionContext, Arc<MemoryLogCollector>, Arc<MemoryTraceSink>) {
    let logs = Arc::new(MemoryLogCollector::new());
    let trace = Arc::new(MemoryTraceSink::new());
    let ctx = create_execution_context(
        ExecutionContextOptions::new("run-docker", "docker-node")
            .log_collector(logs.clone())
            .trace_sink(trace.clone()),
    );
    (ctx, logs, trace)
}

fn sh(script: &str) -> DockerRunnerConfig {
    DockerRunnerConfig::new("alpine:3").with_command(["sh", "-c", script])
}

async fn run(
    harness: &Harness,
    config: DockerRunnerConfig,
    payload: ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, component_sdk::ComponentError> {
    let unused = execute_fn(|_payload, _ctx| async move { Ok(json!("inline")) });
    harness
        .runner
        .run(&RunnerConfig::Docker(config), &unused, payload, ctx)
        .await
}

fn scratch_left(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}

// ============================================================================
// OUTPUT RESOLUTION
// ============================================================================

#[tokio::test]
#[serial]
async fn test_echo_falls_back_to_stdout_text() {
    let h = harness();
    let (ctx, logs, _) = context();
    let config = DockerRunnerConfig::new("alpine:3").with_command(["echo", "hi"]);

    let out = run(&h, config, ExecutionPayload::default(), &ctx).await.unwrap();
    assert_eq!(out, json!("hi"));
    assert!(logs
        .entries()
        .iter()
        .any(|e| e.stream == LogStream::Stdout && e.message == "hi"));
    assert_eq!(scratch_left(&h.scratch_root), 0);
}

#[tokio::test]
#[serial]
async fn test_output_file_is_preferred() {
    let h = harness();
    let (ctx, _, _) = context();
    let config = sh(r#"cat "$COMPONENT_INPUT_PATH" > "$COMPONENT_OUTPUT_PATH"; echo ignored"#);
    let payload = ExecutionPayload::new(json!({"name": "ada"}), json!({"mode": "x"}));

    let out = run(&h, config, payload, &ctx).await.unwrap();
    assert_eq!(out, json!({"inputs": {"name": "ada"}, "params": {"mode": "x"}}));
}

#[tokio::test]
#[serial]
async fn test_stdout_json_is_parsed() {
    let h = harness();
    let (ctx, _, _) = context();
    let out = run(&h, sh(r#"echo '{"n": 3}'"#), ExecutionPayload::default(), &ctx)
        .await
        .unwrap();
    assert_eq!(out, json!({"n": 3}));
}

#[tokio::test]
#[serial]
async fn test_no_output_is_empty_object() {
    let h = harness();
    let (ctx, _, _) = context();
    let out = run(&h, sh("true"), ExecutionPayload::default(), &ctx)
        .await
        .unwrap();
    assert_eq!(out, json!({}));
}

#[tokio::test]
#[serial]
async fn test_invalid_output_file_is_a_container_error() {
    let h = harness();
    let (ctx, _, _) = context();
    let config = sh(r#"printf '{"partial": [1,' > "$COMPONENT_OUTPUT_PATH""#);

    let err = run(&h, config, ExecutionPayload::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Container { .. }));
    let details = err.details().unwrap();
    assert!(details.contains_key("line"));
    assert!(details["preview"].as_str().unwrap().contains("partial"));
    assert_eq!(scratch_left(&h.scratch_root), 0);
}

#[tokio::test]
#[serial]
async fn test_stdin_payload_when_enabled() {
    let h = harness();
    let (ctx, _, _) = context();
    let config = sh("cat").with_stdin_json(true);
    let payload = ExecutionPayload::new(json!({"via": "stdin"}), json!({}));

    let out = run(&h, config, payload, &ctx).await.unwrap();
    assert_eq!(out["inputs"]["via"], "stdin");
}

#[tokio::test]
#[serial]
async fn test_user_env_reaches_the_container() {
    let h = harness();
    let (ctx, _, _) = context();
    let config = sh(r#"echo "$GREETING""#).with_env("GREETING", "bonjour");
    let out = run(&h, config, ExecutionPayload::default(), &ctx).await.unwrap();
    assert_eq!(out, json!("bonjour"));
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
#[serial]
async fn test_non_zero_exit_is_terminal_container_error() {
    let h = harness();
    let (ctx, _, _) = context();
    let err = run(&h, sh("echo boom >&2; exit 1"), ExecutionPayload::default(), &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.error_type(), "ContainerError");
    assert!(!err.is_retryable());
    assert_eq!(err.exit_code(), Some(1));
    assert!(err.details().unwrap()["stderr"]
        .as_str()
        .unwrap()
        .contains("boom"));
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_the_container() {
    let h = harness();
    let (ctx, _, _) = context();
    let config = DockerRunnerConfig::new("alpine:3")
        .with_command(["sleep", "10"])
        .with_timeout_seconds(1);

    let started = Instant::now();
    let err = run(&h, config, ExecutionPayload::default(), &ctx)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.error_type(), "TimeoutError");
    assert!(err.is_retryable());
    assert_eq!(scratch_left(&h.scratch_root), 0);
}

#[tokio::test]
#[serial]
async fn test_missing_binary_is_a_spawn_failure() {
    let mut settings = SdkConfig::default();
    settings.docker.binary = "/nonexistent/docker-binary".into();
    let (ctx, _, _) = context();
    let unused = execute_fn(|_payload, _ctx| async move { Ok(json!(null)) });

    let err = Runner::new(settings)
        .run(
            &RunnerConfig::docker("alpine:3"),
            &unused,
            ExecutionPayload::default(),
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), "ContainerError");
    assert_eq!(err.exit_code(), None);
}

// ============================================================================
// STREAMING
// ============================================================================

#[tokio::test]
#[serial]
async fn test_short_stderr_lines_become_progress() {
    let h = harness();
    let (ctx, logs, trace) = context();
    run(&h, sh("echo 'step 1 of 2' >&2"), ExecutionPayload::default(), &ctx)
        .await
        .unwrap();

    assert!(logs
        .entries()
        .iter()
        .any(|e| e.stream == LogStream::Stderr && e.message == "step 1 of 2"));
    let progress = trace.of_type("NODE_PROGRESS");
    assert!(progress
        .iter()
        .any(|e| serde_json::to_string(&e.kind).unwrap().contains("step 1 of 2")));
}

#[tokio::test]
#[serial]
async fn test_terminal_collector_receives_chunks() {
    let h = harness();
    let terminal = Arc::new(MemoryTerminalCollector::new());
    let ctx = create_execution_context(
        ExecutionContextOptions::new("run-pty", "pty-node").terminal_collector(terminal.clone()),
    );

    let out = run(&h, sh("echo hi"), ExecutionPayload::default(), &ctx)
        .await
        .unwrap();
    assert_eq!(out, json!("hi"));

    // PTY when the host has one, stdout chunks after the stdio fallback
    let mut bytes = terminal.bytes_for(TerminalStream::Pty);
    bytes.extend(terminal.bytes_for(TerminalStream::Stdout));
    assert!(String::from_utf8_lossy(&bytes).contains("hi"));

    let chunks = terminal.chunks();
    let indices: Vec<u64> = chunks
        .iter()
        .filter(|c| c.stream == chunks[0].stream)
        .map(|c| c.chunk_index)
        .collect();
    assert_eq!(indices, (1..=indices.len() as u64).collect::<Vec<_>>());
    assert_eq!(chunks[0].delta_ms, 0);
}

// ============================================================================
// REAL DAEMON (opt-in)
// ============================================================================

#[cfg(feature = "docker-tests")]
#[tokio::test]
#[serial]
async fn test_real_docker_echo() {
    let (ctx, _, _) = context();
    let unused = execute_fn(|_payload, _ctx| async move { Ok(json!(null)) });
    let config = DockerRunnerConfig::new("alpine:3").with_command(["echo", "hi"]);
    let out = Runner::default()
        .run(&RunnerConfig::Docker(config), &unused, ExecutionPayload::default(), &ctx)
        .await
        .unwrap();
    assert_eq!(out, json!("hi"));
}
