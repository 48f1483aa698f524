//! Piped stdin/stdout/stderr transport

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::invocation::DockerInvocation;
use super::ProcessOutcome;
use crate::constants::{READER_DRAIN_TIMEOUT, STDERR_PROGRESS_MAX_LEN, STREAM_READ_BUFFER};
use crate::context::{ExecutionContext, LogLevel, LogStream, TerminalStream};
use crate::error::ComponentError;

pub(crate) async fn run_stdio(
    invocation: &DockerInvocation,
    stdin_payload: Option<Vec<u8>>,
    ctx: &ExecutionContext,
) -> Result<ProcessOutcome, ComponentError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| super::spawn_error(&invocation.program, e))?;

    let stdout = child
        .stdout
        .take()
        .map(|out| ReaderTask::spawn(out, Role::Stdout, ctx.clone()));
    let stderr = child
        .stderr
        .take()
        .map(|err| ReaderTask::spawn(err, Role::Stderr, ctx.clone()));

    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(mut stdin), Some(payload)) = (stdin, stdin_payload) {
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "Container closed stdin before the payload was written");
            }
            // dropped here, which closes the pipe
        }
    };

    let ((), status) = tokio::join!(feed, child.wait());
    let status = status.map_err(|e| {
        ComponentError::container(format!("Failed waiting for container process: {}", e), None)
            .with_cause(e)
    })?;

    let stdout = match stdout {
        Some(task) => task.finish().await,
        None => Vec::new(),
    };
    let stderr = match stderr {
        Some(task) => task.finish().await,
        None => Vec::new(),
    };

    Ok(ProcessOutcome {
        exit_code: status.code(),
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Stdout,
    Stderr,
}

impl Role {
    fn terminal_stream(self) -> TerminalStream {
        match self {
            Self::Stdout => TerminalStream::Stdout,
            Self::Stderr => TerminalStream::Stderr,
        }
    }

    fn forward(self, ctx: &ExecutionContext, line: &str) {
        match self {
            Self::Stdout => ctx.logger().stream_line(LogStream::Stdout, LogLevel::Info, line),
            Self::Stderr => {
                ctx.logger()
                    .stream_line(LogStream::Stderr, LogLevel::Info, line);
                let trimmed = line.trim();
                if !trimmed.is_empty() && trimmed.len() <= STDERR_PROGRESS_MAX_LEN {
                    ctx.emit_progress(trimmed);
                }
            }
        }
    }
}

/// Stream reader aborted on drop, so a timed-out invocation leaves nothing behind
struct ReaderTask {
    role: Role,
    handle: JoinHandle<Vec<u8>>,
}

impl ReaderTask {
    fn spawn<R>(reader: R, role: Role, ctx: ExecutionContext) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(pump(reader, role, ctx));
        Self { role, handle }
    }

    async fn finish(mut self) -> Vec<u8> {
        match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut self.handle).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::warn!(stream = ?self.role, error = %e, "Stream reader failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(stream = ?self.role, "Stream still open after process exit, dropping reader");
                Vec::new()
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn pump<R>(mut reader: R, role: Role, ctx: ExecutionContext) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let emitter = ctx.terminal_emitter(role.terminal_stream());
    let mut captured = Vec::new();
    let mut lines = LineBuffer::default();
    let mut buf = vec![0u8; STREAM_READ_BUFFER];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let bytes = &buf[..n];
                if let Some(emitter) = &emitter {
                    emitter.emit(bytes);
                }
                captured.extend_from_slice(bytes);
                for line in lines.push(bytes) {
                    role.forward(&ctx, &line);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(stream = ?role, error = %e, "Stream read failed");
                break;
            }
        }
    }

    if let Some(rest) = lines.finish() {
        role.forward(&ctx, &rest);
    }
    captured
}

/// Splits a byte stream into lines across read boundaries
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_reads() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"hel").is_empty());
        assert_eq!(buffer.push(b"lo\r\nwor"), vec!["hello"]);
        assert_eq!(buffer.push(b"ld\n\n"), vec!["world", ""]);
        assert_eq!(buffer.finish(), None);

        buffer.push(b"tail");
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push(b"a\xffb\n");
        assert_eq!(lines, vec!["a\u{fffd}b"]);
    }
}
