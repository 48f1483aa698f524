//! Ready-made sinks: in-memory, no-op and NDJSON file

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::logger::{LogCollector, LogEntry};
use super::terminal::{TerminalChunk, TerminalCollector, TerminalStream};
use super::trace::{TraceEvent, TraceSink};
use crate::error::Result;

// ═══════════════════════════════════════════
// Trace sinks
// ═══════════════════════════════════════════

/// Append-only, thread-safe trace store
#[derive(Clone, Default)]
pub struct MemoryTraceSink {
    events: Arc<RwLock<Vec<TraceEvent>>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.read().clone()
    }

    /// Events whose wire type equals `type_name` (e.g. `HTTP_REQUEST_SENT`)
    pub fn of_type(&self, type_name: &str) -> Vec<TraceEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.type_name() == type_name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All events as a JSON array
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.events()).unwrap_or(serde_json::Value::Null)
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, event: TraceEvent) {
        self.events.write().push(event);
    }
}

impl std::fmt::Debug for MemoryTraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTraceSink")
            .field("len", &self.len())
            .finish()
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn record(&self, _event: TraceEvent) {}
}

/// Writes one JSON object per line, flushing after each event
pub struct NdjsonTraceSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl NdjsonTraceSink {
    /// Create (truncate) the file, creating parent directories as needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        tracing::info!(path = %path.display(), "Created trace file");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_event(&self, event: &TraceEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

impl TraceSink for NdjsonTraceSink {
    fn record(&self, event: TraceEvent) {
        if let Err(e) = self.write_event(&event) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write trace event");
        }
    }
}

impl std::fmt::Debug for NdjsonTraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonTraceSink")
            .field("path", &self.path)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Log and terminal collectors
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct MemoryLogCollector {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MemoryLogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Messages only, in arrival order
    pub fn messages(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogCollector for MemoryLogCollector {
    fn collect(&self, entry: LogEntry) {
        self.entries.write().push(entry);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTerminalCollector {
    chunks: Arc<RwLock<Vec<TerminalChunk>>>,
}

impl MemoryTerminalCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<TerminalChunk> {
        self.chunks.read().clone()
    }

    /// Concatenated raw bytes of one stream, in chunk order
    pub fn bytes_for(&self, stream: TerminalStream) -> Vec<u8> {
        let mut chunks: Vec<_> = self
            .chunks
            .read()
            .iter()
            .filter(|c| c.stream == stream)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
            .iter()
            .filter_map(|c| c.bytes().ok())
            .flatten()
            .collect()
    }
}

impl TerminalCollector for MemoryTerminalCollector {
    fn collect(&self, chunk: TerminalChunk) {
        self.chunks.write().push(chunk);
    }
}
