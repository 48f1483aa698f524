//! Docker runner
//!
//! One fresh container per invocation:
//! 1. scratch dir with `input.json`, mounted at `/component-io`
//! 2. `docker run --rm` with the configured network, volumes and env
//! 3. PTY transport when a terminal collector is attached, stdio otherwise
//! 4. timeout race with kill
//! 5. output file, stdout JSON, stdout text, `{}`
//!
//! The scratch dir, timer and child handles are owned by the invocation
//! future and released on every exit path.

mod invocation;
mod output;
mod pty;
mod scratch;
mod stdio;

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::component::ExecutionPayload;
use crate::config::DockerSettings;
use crate::constants::{CONTAINER_KILL_TIMEOUT, STDERR_TAIL_BYTES};
use crate::context::{ExecutionContext, TerminalChunkEmitter, TerminalStream};
use crate::error::ComponentError;
use crate::runner::config::DockerRunnerConfig;

use invocation::{DockerInvocation, Transport};
use pty::PtyError;
use scratch::ScratchDir;

/// Exit status plus captured streams of a finished container process
#[derive(Debug, Default)]
pub(crate) struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub(crate) async fn run_docker(
    config: &DockerRunnerConfig,
    settings: &DockerSettings,
    payload: &ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, ComponentError> {
    let scratch = ScratchDir::create(settings.scratch_root.as_deref())?;
    scratch.write_input(payload)?;

    let limit = config.timeout(settings);
    let pty_emitter = ctx.terminal_emitter(TerminalStream::Pty);
    let transport = if pty_emitter.is_some() {
        Transport::Pty
    } else {
        Transport::Stdio {
            stdin: config.writes_stdin(),
        }
    };
    let invocation = DockerInvocation::build(&settings.binary, config, scratch.path(), transport);

    ctx.logger().info(format!(
        "Starting container {} ({})",
        config.image, invocation.container_name
    ));
    tracing::debug!(command = %invocation.display(), "docker invocation");

    let run = attach(
        config,
        settings,
        payload,
        ctx,
        scratch.path(),
        invocation.clone(),
        pty_emitter,
    );
    let outcome = match tokio::time::timeout(limit, run).await {
        Ok(outcome) => outcome?,
        Err(_) => {
            kill_container(&settings.binary, &invocation.container_name).await;
            ctx.logger().error(format!(
                "Container {} timed out after {}s",
                invocation.container_name,
                limit.as_secs()
            ));
            return Err(ComponentError::timeout(
                format!(
                    "Container {} exceeded its {}s timeout",
                    config.image,
                    limit.as_secs()
                ),
                Some(duration_ms(limit)),
            )
            .with_detail("image", config.image.clone())
            .with_detail("container", invocation.container_name.clone()));
        }
    };

    if !outcome.success {
        let stderr = tail(&outcome.stderr, STDERR_TAIL_BYTES);
        let message = match outcome.exit_code {
            Some(code) => format!("Container {} exited with code {}", config.image, code),
            None => format!("Container {} was terminated by a signal", config.image),
        };
        ctx.logger().error(&message);
        return Err(ComponentError::container(message, outcome.exit_code)
            .with_detail("image", config.image.clone())
            .with_detail("stderr", stderr));
    }

    let value = output::resolve_output(&scratch.output_path(), &outcome.stdout)?;
    ctx.logger().info(format!("Container {} finished", config.image));
    Ok(value)
}

/// Run the process on the chosen transport, falling back from PTY to stdio
#[allow(clippy::too_many_arguments)]
async fn attach(
    config: &DockerRunnerConfig,
    settings: &DockerSettings,
    payload: &ExecutionPayload,
    ctx: &ExecutionContext,
    scratch: &Path,
    invocation: DockerInvocation,
    pty_emitter: Option<TerminalChunkEmitter>,
) -> Result<ProcessOutcome, ComponentError> {
    let invocation = match pty_emitter {
        Some(emitter) => {
            if config.writes_stdin() {
                tracing::debug!("stdin payload skipped in PTY mode, input is in the mounted file");
            }
            match pty::run_pty(&invocation, emitter).await {
                Ok(outcome) => return Ok(outcome),
                Err(PtyError::Failed(err)) => return Err(err),
                Err(PtyError::Unavailable(reason)) => {
                    ctx.logger().warn(format!(
                        "PTY unavailable ({}), falling back to stdio",
                        reason
                    ));
                    DockerInvocation::build_named(
                        &settings.binary,
                        config,
                        scratch,
                        Transport::Stdio {
                            stdin: config.writes_stdin(),
                        },
                        invocation.container_name,
                    )
                }
            }
        }
        None => invocation,
    };

    let stdin = if config.writes_stdin() {
        Some(serde_json::to_vec(payload).map_err(|e| {
            ComponentError::invalid_field("payload", format!("not serializable: {}", e))
        })?)
    } else {
        None
    };
    stdio::run_stdio(&invocation, stdin, ctx).await
}

/// Best-effort `docker kill`; the `--rm` flag removes the container afterwards
async fn kill_container(binary: &str, name: &str) {
    let mut command = tokio::process::Command::new(binary);
    command
        .args(["kill", name])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(CONTAINER_KILL_TIMEOUT, command.status()).await {
        Ok(Ok(status)) => tracing::debug!(container = name, %status, "docker kill finished"),
        Ok(Err(e)) => tracing::warn!(container = name, error = %e, "docker kill failed"),
        Err(_) => tracing::warn!(container = name, "docker kill timed out"),
    }
}

pub(crate) fn spawn_error(program: &str, err: std::io::Error) -> ComponentError {
    ComponentError::container(
        format!("Failed to start container runtime '{}': {}", program, err),
        None,
    )
    .with_detail("binary", program.to_string())
    .with_cause(err)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Last `max` bytes of `text`, cut on a char boundary
fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
