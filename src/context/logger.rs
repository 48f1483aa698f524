//! Component logger
//!
//! Every call writes a `tracing` event. When a log collector is attached it
//! also receives a [`LogEntry`], and when a trace sink is attached the message
//! is mirrored as `NODE_PROGRESS` with `data.origin = "log"`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::metadata::ExecutionContextMetadata;
use super::trace::{LogLevel, ScopedTrace, TraceEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    Console,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub run_id: String,
    pub node_ref: String,
    pub stream: LogStream,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Receiver of log entries (fire-and-forget)
pub trait LogCollector: Send + Sync {
    fn collect(&self, entry: LogEntry);
}

#[derive(Clone)]
pub struct ComponentLogger {
    metadata: Arc<ExecutionContextMetadata>,
    collector: Option<Arc<dyn LogCollector>>,
    trace: Option<ScopedTrace>,
}

impl ComponentLogger {
    pub fn new(
        metadata: Arc<ExecutionContextMetadata>,
        collector: Option<Arc<dyn LogCollector>>,
        trace: Option<ScopedTrace>,
    ) -> Self {
        Self {
            metadata,
            collector,
            trace,
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if message.is_empty() {
            return;
        }
        self.emit_tracing(level, message);
        self.collect(LogStream::Console, level, message, None);
        if let Some(trace) = &self.trace {
            trace.record(TraceEventKind::NodeProgress {
                level,
                message: message.to_string(),
                data: Some(json!({ "origin": "log" })),
            });
        }
    }

    /// Forward one line of process output to the log collector only
    pub fn stream_line(&self, stream: LogStream, level: LogLevel, line: &str) {
        if line.is_empty() {
            return;
        }
        tracing::debug!(
            run_id = %self.metadata.run_id,
            node_ref = %self.metadata.component_ref,
            stream = ?stream,
            "{}",
            line
        );
        self.collect(stream, level, line, None);
    }

    fn collect(&self, stream: LogStream, level: LogLevel, message: &str, metadata: Option<Value>) {
        if let Some(collector) = &self.collector {
            collector.collect(LogEntry {
                run_id: self.metadata.run_id.clone(),
                node_ref: self.metadata.component_ref.clone(),
                stream,
                level,
                message: message.to_string(),
                timestamp: Utc::now(),
                metadata,
            });
        }
    }

    fn emit_tracing(&self, level: LogLevel, message: &str) {
        let run_id = &self.metadata.run_id;
        let node_ref = &self.metadata.component_ref;
        match level {
            LogLevel::Debug => tracing::debug!(%run_id, %node_ref, "{}", message),
            LogLevel::Info => tracing::info!(%run_id, %node_ref, "{}", message),
            LogLevel::Warn => tracing::warn!(%run_id, %node_ref, "{}", message),
            LogLevel::Error => tracing::error!(%run_id, %node_ref, "{}", message),
        }
    }
}

impl std::fmt::Debug for ComponentLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLogger")
            .field("node_ref", &self.metadata.component_ref)
            .field("collector", &self.collector.is_some())
            .field("trace", &self.trace.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::collectors::{MemoryLogCollector, MemoryTraceSink};

    fn logger() -> (ComponentLogger, Arc<MemoryLogCollector>, Arc<MemoryTraceSink>) {
        let meta = Arc::new(ExecutionContextMetadata::new("run-1", "node-1"));
        let logs = Arc::new(MemoryLogCollector::new());
        let sink = Arc::new(MemoryTraceSink::new());
        let trace = ScopedTrace::new(sink.clone(), meta.clone());
        (
            ComponentLogger::new(meta, Some(logs.clone()), Some(trace)),
            logs,
            sink,
        )
    }

    #[test]
    fn log_reaches_collector_and_trace() {
        let (logger, logs, sink) = logger();
        logger.warn("disk almost full");

        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].stream, LogStream::Console);

        match &sink.events()[0].kind {
            TraceEventKind::NodeProgress { level, message, data } => {
                assert_eq!(*level, LogLevel::Warn);
                assert_eq!(message, "disk almost full");
                assert_eq!(data.as_ref().unwrap()["origin"], "log");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn empty_message_is_silent() {
        let (logger, logs, sink) = logger();
        logger.info("");
        assert!(logs.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn stream_lines_skip_trace() {
        let (logger, logs, sink) = logger();
        logger.stream_line(LogStream::Stderr, LogLevel::Error, "warning: x");
        assert_eq!(logs.entries()[0].stream, LogStream::Stderr);
        assert!(sink.is_empty());
    }

    #[test]
    fn works_without_sinks() {
        let meta = Arc::new(ExecutionContextMetadata::new("r", "n"));
        let logger = ComponentLogger::new(meta, None, None);
        logger.error("nobody listens");
    }
}
