//! Byte-accurate terminal output chunks for remote rendering
//!
//! Each [`TerminalChunkEmitter`] numbers its chunks from 1 and keeps
//! `recorded_at` non-decreasing even if the wall clock steps backwards.
//! A context hands out clones of one emitter per stream, so the count runs
//! across the whole invocation.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::metadata::ExecutionContextMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStream {
    Stdout,
    Stderr,
    Console,
    Pty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalChunk {
    pub run_id: String,
    pub node_ref: String,
    pub stream: TerminalStream,
    pub chunk_index: u64,
    /// Base64 of the raw bytes
    pub payload: String,
    pub recorded_at: DateTime<Utc>,
    /// Milliseconds since the previous chunk of this emitter, 0 for the first
    pub delta_ms: u64,
}

impl TerminalChunk {
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.payload)
    }
}

/// Receiver of terminal chunks (fire-and-forget)
pub trait TerminalCollector: Send + Sync {
    fn collect(&self, chunk: TerminalChunk);
}

#[derive(Debug, Default)]
struct EmitterState {
    last_index: u64,
    last_recorded: Option<DateTime<Utc>>,
}

/// Numbered chunk producer for one stream of one invocation
///
/// Clones share the same counter.
#[derive(Clone)]
pub struct TerminalChunkEmitter {
    collector: Arc<dyn TerminalCollector>,
    metadata: Arc<ExecutionContextMetadata>,
    stream: TerminalStream,
    state: Arc<Mutex<EmitterState>>,
}

impl TerminalChunkEmitter {
    pub fn new(
        collector: Arc<dyn TerminalCollector>,
        metadata: Arc<ExecutionContextMetadata>,
        stream: TerminalStream,
    ) -> Self {
        Self {
            collector,
            metadata,
            stream,
            state: Arc::new(Mutex::new(EmitterState::default())),
        }
    }

    pub fn stream(&self) -> TerminalStream {
        self.stream
    }

    /// Emit `bytes` as the next chunk; empty input emits nothing
    pub fn emit(&self, bytes: &[u8]) -> Option<u64> {
        if bytes.is_empty() {
            return None;
        }

        let chunk = {
            let mut state = self.state.lock();
            let now = Utc::now();
            let recorded_at = match state.last_recorded {
                Some(last) if now < last => last,
                _ => now,
            };
            let delta_ms = state
                .last_recorded
                .map(|last| (recorded_at - last).num_milliseconds().max(0) as u64)
                .unwrap_or(0);
            state.last_index += 1;
            state.last_recorded = Some(recorded_at);

            TerminalChunk {
                run_id: self.metadata.run_id.clone(),
                node_ref: self.metadata.component_ref.clone(),
                stream: self.stream,
                chunk_index: state.last_index,
                payload: STANDARD.encode(bytes),
                recorded_at,
                delta_ms,
            }
        };

        let index = chunk.chunk_index;
        self.collector.collect(chunk);
        Some(index)
    }

    /// Chunks emitted so far
    pub fn emitted(&self) -> u64 {
        self.state.lock().last_index
    }
}

impl std::fmt::Debug for TerminalChunkEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalChunkEmitter")
            .field("stream", &self.stream)
            .field("emitted", &self.emitted())
            .finish()
    }
}
