//! Pseudo-terminal transport
//!
//! The container runs with `-t` and its combined output is forwarded
//! byte-for-byte to a `pty` terminal emitter. Nothing is ever written to the
//! terminal's input side.

use std::io::Read;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};

use super::invocation::DockerInvocation;
use super::ProcessOutcome;
use crate::constants::{PTY_COLS, PTY_ROWS, READER_DRAIN_TIMEOUT, STREAM_READ_BUFFER};
use crate::context::TerminalChunkEmitter;
use crate::error::ComponentError;

#[derive(Debug)]
pub(crate) enum PtyError {
    /// No usable PTY backend; the caller falls back to stdio
    Unavailable(String),
    Failed(ComponentError),
}

/// Kills the child when dropped unless it has already been reaped
struct KillOnDrop(Option<Box<dyn ChildKiller + Send + Sync>>);

impl KillOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if let Some(killer) = self.0.as_mut() {
            if let Err(e) = killer.kill() {
                tracing::debug!(error = %e, "PTY child already gone");
            }
        }
    }
}

pub(crate) async fn run_pty(
    invocation: &DockerInvocation,
    emitter: TerminalChunkEmitter,
) -> Result<ProcessOutcome, PtyError> {
    let pair = native_pty_system()
        .openpty(PtySize {
            rows: PTY_ROWS,
            cols: PTY_COLS,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| PtyError::Unavailable(format!("openpty failed: {}", e)))?;

    let mut command = CommandBuilder::new(&invocation.program);
    command.args(&invocation.args);

    let mut child = pair
        .slave
        .spawn_command(command)
        .map_err(|e| PtyError::Unavailable(format!("spawn in PTY failed: {}", e)))?;
    // Our copy of the slave must close for the reader to see EOF
    drop(pair.slave);

    let mut guard = KillOnDrop(Some(child.clone_killer()));

    let reader = pair.master.try_clone_reader().map_err(|e| {
        PtyError::Failed(ComponentError::container(
            format!("Failed to attach to PTY output: {}", e),
            None,
        ))
    })?;
    let mut reader_task = tokio::task::spawn_blocking(move || pump(reader, emitter));

    let status = tokio::task::spawn_blocking(move || child.wait())
        .await
        .map_err(|e| {
            PtyError::Failed(ComponentError::container(
                format!("PTY wait task failed: {}", e),
                None,
            ))
        })?
        .map_err(|e| {
            PtyError::Failed(
                ComponentError::container(format!("Failed waiting for container process: {}", e), None)
                    .with_cause(e),
            )
        })?;
    guard.disarm();

    let captured = match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader_task).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "PTY reader failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("PTY still open after process exit, dropping reader");
            Vec::new()
        }
    };
    drop(pair.master);

    let text = String::from_utf8_lossy(&captured).replace("\r\n", "\n");
    let exit_code = i32::try_from(status.exit_code()).unwrap_or(i32::MAX);
    Ok(ProcessOutcome {
        exit_code: Some(exit_code),
        success: status.success(),
        // A terminal merges both streams
        stderr: if status.success() { String::new() } else { text.clone() },
        stdout: text,
    })
}

fn pump(mut reader: Box<dyn Read + Send>, emitter: TerminalChunkEmitter) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut buf = vec![0u8; STREAM_READ_BUFFER];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                emitter.emit(&buf[..n]);
                captured.extend_from_slice(&buf[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side is closed
            Err(e) if e.raw_os_error() == Some(EIO) => break,
            Err(e) => {
                tracing::debug!(error = %e, "PTY read failed");
                break;
            }
        }
    }
    captured
}

const EIO: i32 = 5;
