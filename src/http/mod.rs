//! HTTP instrumentation
//!
//! [`create_http_client`] wraps `reqwest` so that every call made by a
//! component shows up in the trace as masked, size-capped HAR records.

mod client;
pub mod har;
mod mask;
mod timing;

pub use client::{
    create_http_client, to_curl, FetchOptions, HttpClient, HttpClientOptions, HttpResponse,
};
pub use har::{HarEntry, HarRequest, HarResponse, HarTimings};
pub use mask::Masker;
pub use timing::{
    global_timing_recorder, InstantTimingRecorder, NoopTimingRecorder, TimingRecorder,
};
