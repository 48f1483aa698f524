//! Best-effort request phase timing
//!
//! Timings are matched to requests by URL through a FIFO queue, so
//! concurrent requests to the same URL are paired in start order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::har::HarTimings;

pub trait TimingRecorder: Send + Sync {
    fn request_started(&self, url: &str);

    /// Response headers arrived for the oldest pending request on `url`
    fn response_started(&self, url: &str);

    /// Pop the oldest pending request on `url` and report its phases
    fn request_finished(&self, url: &str) -> HarTimings;

    /// Drop the oldest pending request on `url` without reporting
    fn discard(&self, url: &str);
}

#[derive(Debug, Clone, Copy)]
struct PendingTiming {
    started: Instant,
    first_byte: Option<Instant>,
}

/// Wall-clock recorder: measures `wait` (to headers) and `receive` (body)
#[derive(Debug, Default)]
pub struct InstantTimingRecorder {
    pending: DashMap<String, VecDeque<PendingTiming>>,
}

impl InstantTimingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests started but not yet finished or discarded
    pub fn pending_count(&self) -> usize {
        self.pending.iter().map(|q| q.len()).sum()
    }

    fn pop(&self, url: &str) -> Option<PendingTiming> {
        let popped = self.pending.get_mut(url).and_then(|mut q| q.pop_front());
        self.pending.remove_if(url, |_, q| q.is_empty());
        popped
    }
}

impl TimingRecorder for InstantTimingRecorder {
    fn request_started(&self, url: &str) {
        self.pending
            .entry(url.to_string())
            .or_default()
            .push_back(PendingTiming {
                started: Instant::now(),
                first_byte: None,
            });
    }

    fn response_started(&self, url: &str) {
        if let Some(mut queue) = self.pending.get_mut(url) {
            if let Some(entry) = queue.iter_mut().find(|e| e.first_byte.is_none()) {
                entry.first_byte = Some(Instant::now());
            }
        }
    }

    fn request_finished(&self, url: &str) -> HarTimings {
        let Some(entry) = self.pop(url) else {
            return HarTimings::UNKNOWN;
        };
        let now = Instant::now();
        match entry.first_byte {
            Some(first_byte) => HarTimings {
                wait: millis(first_byte - entry.started),
                receive: millis(now - first_byte),
                ..HarTimings::UNKNOWN
            },
            None => HarTimings {
                wait: millis(now - entry.started),
                ..HarTimings::UNKNOWN
            },
        }
    }

    fn discard(&self, url: &str) {
        self.pop(url);
    }
}

/// One started request; discarded on drop unless finished
///
/// Keeps the per-URL queue balanced when the fetch future is cancelled.
pub(crate) struct PendingRequest {
    recorder: Arc<dyn TimingRecorder>,
    url: String,
    armed: bool,
}

impl PendingRequest {
    pub(crate) fn start(recorder: Arc<dyn TimingRecorder>, url: String) -> Self {
        recorder.request_started(&url);
        Self {
            recorder,
            url,
            armed: true,
        }
    }

    pub(crate) fn response_started(&self) {
        self.recorder.response_started(&self.url);
    }

    pub(crate) fn finish(mut self) -> HarTimings {
        self.armed = false;
        self.recorder.request_finished(&self.url)
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.armed {
            self.recorder.discard(&self.url);
        }
    }
}

fn millis(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Reports -1 for every phase
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTimingRecorder;

impl TimingRecorder for NoopTimingRecorder {
    fn request_started(&self, _url: &str) {}
    fn response_started(&self, _url: &str) {}
    fn request_finished(&self, _url: &str) -> HarTimings {
        HarTimings::UNKNOWN
    }
    fn discard(&self, _url: &str) {}
}

static GLOBAL_RECORDER: Lazy<Arc<InstantTimingRecorder>> =
    Lazy::new(|| Arc::new(InstantTimingRecorder::new()));

/// Process-wide recorder shared by clients that do not bring their own
pub fn global_timing_recorder() -> Arc<dyn TimingRecorder> {
    GLOBAL_RECORDER.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_per_url() {
        let recorder = InstantTimingRecorder::new();
        recorder.request_started("https://a/");
        recorder.request_started("https://a/");
        recorder.request_started("https://b/");
        assert_eq!(recorder.pending_count(), 3);

        recorder.response_started("https://a/");
        let first = recorder.request_finished("https://a/");
        assert!(first.wait >= 0.0);
        assert!(first.receive >= 0.0);

        // second request on the same URL never saw headers
        let second = recorder.request_finished("https://a/");
        assert!(second.wait >= 0.0);
        assert_eq!(second.receive, -1.0);

        assert_eq!(recorder.pending_count(), 1);
        recorder.discard("https://b/");
        assert_eq!(recorder.pending_count(), 0);
    }

    #[test]
    fn pending_request_discards_unless_finished() {
        let recorder = Arc::new(InstantTimingRecorder::new());
        let dropped = PendingRequest::start(recorder.clone(), "https://a/".into());
        assert_eq!(recorder.pending_count(), 1);
        drop(dropped);
        assert_eq!(recorder.pending_count(), 0);

        let finished = PendingRequest::start(recorder.clone(), "https://a/".into());
        finished.response_started();
        let timings = finished.finish();
        assert!(timings.receive >= 0.0);
        assert_eq!(recorder.pending_count(), 0);
    }

    #[test]
    fn unknown_url_reports_unknown() {
        let recorder = InstantTimingRecorder::new();
        assert_eq!(recorder.request_finished("https://nowhere/"), HarTimings::UNKNOWN);
    }

    #[test]
    fn noop_reports_minus_one() {
        let t = NoopTimingRecorder.request_finished("x");
        for phase in [t.blocked, t.dns, t.connect, t.ssl, t.send, t.wait, t.receive] {
            assert_eq!(phase, -1.0);
        }
    }
}
