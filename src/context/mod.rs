//! Execution Context - capabilities handed to a component invocation
//!
//! An [`ExecutionContext`] is built once per invocation by
//! [`create_execution_context`] and is cheap to clone. It bundles:
//! - frozen [`ExecutionContextMetadata`] (run id, node ref, attempt, ...)
//! - a [`ComponentLogger`] and progress reporting
//! - an optional [`ScopedTrace`] and terminal chunk emitters
//! - optional storage, secrets and artifact service handles

pub mod collectors;
mod logger;
mod metadata;
mod services;
mod terminal;
mod trace;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use collectors::{
    MemoryLogCollector, MemoryTerminalCollector, MemoryTraceSink, NdjsonTraceSink, NoopTraceSink,
};
pub use logger::{ComponentLogger, LogCollector, LogEntry, LogStream};
pub use metadata::{ExecutionContextMetadata, FailureMetadata, FailureReason, JoinStrategy};
pub use services::{
    ArtifactRef, ArtifactService, ArtifactUpload, FileMetadata, SecretValue, SecretsService,
    StaticSecrets, StorageService, StoredFile,
};
pub use terminal::{TerminalChunk, TerminalChunkEmitter, TerminalCollector, TerminalStream};
pub use trace::{ErrorSummary, LogLevel, ScopedTrace, TraceEvent, TraceEventKind, TraceSink};

/// Progress report; plain strings become info-level messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressUpdate {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&str> for ProgressUpdate {
    fn from(message: &str) -> Self {
        Self::new(LogLevel::Info, message)
    }
}

impl From<String> for ProgressUpdate {
    fn from(message: String) -> Self {
        Self::new(LogLevel::Info, message)
    }
}

/// Inputs to [`create_execution_context`]
#[derive(Clone)]
pub struct ExecutionContextOptions {
    metadata: ExecutionContextMetadata,
    trace: Option<Arc<dyn TraceSink>>,
    logs: Option<Arc<dyn LogCollector>>,
    terminal: Option<Arc<dyn TerminalCollector>>,
    storage: Option<Arc<dyn StorageService>>,
    secrets: Option<Arc<dyn SecretsService>>,
    artifacts: Option<Arc<dyn ArtifactService>>,
}

impl ExecutionContextOptions {
    pub fn new(run_id: impl Into<String>, component_ref: impl Into<String>) -> Self {
        Self::from_metadata(ExecutionContextMetadata::new(run_id, component_ref))
    }

    pub fn from_metadata(metadata: ExecutionContextMetadata) -> Self {
        Self {
            metadata,
            trace: None,
            logs: None,
            terminal: None,
            storage: None,
            secrets: None,
            artifacts: None,
        }
    }

    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn log_collector(mut self, collector: Arc<dyn LogCollector>) -> Self {
        self.logs = Some(collector);
        self
    }

    pub fn terminal_collector(mut self, collector: Arc<dyn TerminalCollector>) -> Self {
        self.terminal = Some(collector);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageService>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn secrets(mut self, secrets: Arc<dyn SecretsService>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactService>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }
}

/// Freeze the options into a shareable context
pub fn create_execution_context(options: ExecutionContextOptions) -> ExecutionContext {
    let metadata = Arc::new(options.metadata);
    let trace = options
        .trace
        .map(|sink| ScopedTrace::new(sink, Arc::clone(&metadata)));
    let logger = ComponentLogger::new(Arc::clone(&metadata), options.logs, trace.clone());

    ExecutionContext {
        inner: Arc::new(ContextInner {
            metadata,
            logger,
            trace,
            terminal: options.terminal,
            emitters: Mutex::new(HashMap::new()),
            storage: options.storage,
            secrets: options.secrets,
            artifacts: options.artifacts,
        }),
    }
}

struct ContextInner {
    metadata: Arc<ExecutionContextMetadata>,
    logger: ComponentLogger,
    trace: Option<ScopedTrace>,
    terminal: Option<Arc<dyn TerminalCollector>>,
    /// One emitter per stream, shared by every `terminal_emitter` call
    emitters: Mutex<HashMap<TerminalStream, TerminalChunkEmitter>>,
    storage: Option<Arc<dyn StorageService>>,
    secrets: Option<Arc<dyn SecretsService>>,
    artifacts: Option<Arc<dyn ArtifactService>>,
}

/// Immutable capability bundle for one invocation
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    pub fn run_id(&self) -> &str {
        &self.inner.metadata.run_id
    }

    pub fn component_ref(&self) -> &str {
        &self.inner.metadata.component_ref
    }

    pub fn metadata(&self) -> &Arc<ExecutionContextMetadata> {
        &self.inner.metadata
    }

    pub fn logger(&self) -> &ComponentLogger {
        &self.inner.logger
    }

    pub fn trace(&self) -> Option<&ScopedTrace> {
        self.inner.trace.as_ref()
    }

    /// Report progress as `NODE_PROGRESS`, timestamped now
    pub fn emit_progress(&self, update: impl Into<ProgressUpdate>) {
        let update = update.into();
        tracing::debug!(
            run_id = %self.run_id(),
            node_ref = %self.component_ref(),
            progress_level = update.level.as_str(),
            "progress: {}",
            update.message
        );
        if let Some(trace) = &self.inner.trace {
            trace.record(TraceEventKind::NodeProgress {
                level: update.level,
                message: update.message,
                data: update.data,
            });
        }
    }

    /// Emitter for `stream`, when a terminal collector is attached
    ///
    /// Every call for the same stream shares one counter.
    pub fn terminal_emitter(&self, stream: TerminalStream) -> Option<TerminalChunkEmitter> {
        let collector = self.inner.terminal.as_ref()?;
        let mut emitters = self.inner.emitters.lock();
        let emitter = emitters.entry(stream).or_insert_with(|| {
            TerminalChunkEmitter::new(Arc::clone(collector), Arc::clone(&self.inner.metadata), stream)
        });
        Some(emitter.clone())
    }

    pub fn storage(&self) -> Option<&Arc<dyn StorageService>> {
        self.inner.storage.as_ref()
    }

    pub fn secrets(&self) -> Option<&Arc<dyn SecretsService>> {
        self.inner.secrets.as_ref()
    }

    pub fn artifacts(&self) -> Option<&Arc<dyn ArtifactService>> {
        self.inner.artifacts.as_ref()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id())
            .field("component_ref", &self.component_ref())
            .field("trace", &self.inner.trace.is_some())
            .field("terminal", &self.inner.terminal.is_some())
            .finish()
    }
}
