//! Instrumented HTTP client
//!
//! Every request is recorded as `HTTP_REQUEST_SENT` before it leaves, then
//! as `HTTP_RESPONSE_RECEIVED` (full HAR entry) or `HTTP_REQUEST_ERROR`.
//! Only the first `max_response_body_bytes` of a response are buffered for
//! the HAR entry; the caller still reads the complete body.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{IntoUrl, Method, Request, RequestBuilder, Response, StatusCode, Url, Version};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::har::{HarContent, HarEntry, HarPostData, HarRequest, HarResponse};
use super::mask::Masker;
use super::timing::{global_timing_recorder, PendingRequest, TimingRecorder};
use crate::config::HttpSettings;
use crate::constants::{DEFAULT_MAX_REQUEST_BODY_BYTES, DEFAULT_MAX_RESPONSE_BODY_BYTES};
use crate::context::{ErrorSummary, ExecutionContext, TraceEventKind};
use crate::error::ComponentError;

#[derive(Clone)]
pub struct HttpClientOptions {
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
    /// Extra header/query names to mask on top of the builtin list
    pub sensitive_headers: Vec<String>,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Defaults to the process-wide recorder
    pub timing: Option<Arc<dyn TimingRecorder>>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
            sensitive_headers: Vec::new(),
            timeout: None,
            user_agent: None,
            timing: None,
        }
    }
}

impl From<&HttpSettings> for HttpClientOptions {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            max_request_body_bytes: settings.max_request_body_bytes,
            max_response_body_bytes: settings.max_response_body_bytes,
            timeout: settings.timeout_seconds.map(Duration::from_secs),
            user_agent: settings.user_agent.clone(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for HttpClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientOptions")
            .field("max_request_body_bytes", &self.max_request_body_bytes)
            .field("max_response_body_bytes", &self.max_response_body_bytes)
            .field("sensitive_headers", &self.sensitive_headers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-call overrides for [`HttpClient::fetch_with`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Reuse an existing correlation id instead of generating one
    pub correlation_id: Option<String>,
}

/// Build an instrumented client bound to `ctx`
pub fn create_http_client(
    ctx: &ExecutionContext,
    options: HttpClientOptions,
) -> Result<HttpClient, ComponentError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(agent) = &options.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    let client = builder.build().map_err(|e| {
        ComponentError::configuration(format!("Failed to build HTTP client: {}", e), None)
            .with_cause(e)
    })?;

    Ok(HttpClient {
        client,
        ctx: ctx.clone(),
        masker: Masker::new(&options.sensitive_headers),
        timing: options.timing.clone().unwrap_or_else(global_timing_recorder),
        options,
    })
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    ctx: ExecutionContext,
    masker: Masker,
    timing: Arc<dyn TimingRecorder>,
    options: HttpClientOptions,
}

impl HttpClient {
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn get(&self, url: impl IntoUrl) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl IntoUrl) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Build and fetch
    pub async fn send(&self, builder: RequestBuilder) -> Result<HttpResponse, reqwest::Error> {
        let request = builder.build()?;
        self.fetch(request).await
    }

    pub async fn fetch(&self, request: Request) -> Result<HttpResponse, reqwest::Error> {
        self.fetch_with(request, FetchOptions::default()).await
    }

    #[instrument(
        name = "http_fetch",
        skip_all,
        fields(method = %request.method(), host = request.url().host_str().unwrap_or_default())
    )]
    pub async fn fetch_with(
        &self,
        request: Request,
        options: FetchOptions,
    ) -> Result<HttpResponse, reqwest::Error> {
        let correlation_id = options
            .correlation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let started_at = Utc::now();
        let clock = Instant::now();
        let url_key = request.url().to_string();
        let har_request = self.har_request(&request);

        let pending = PendingRequest::start(Arc::clone(&self.timing), url_key);
        self.record(TraceEventKind::HttpRequestSent {
            correlation_id: correlation_id.clone(),
            request: har_request.clone(),
        });

        let mut response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                drop(pending);
                let message = self.masker.error_message(&err);
                debug!(correlation_id = %correlation_id, error = %message, "HTTP request failed");
                self.record(TraceEventKind::HttpRequestError {
                    correlation_id,
                    request: har_request,
                    error: ErrorSummary {
                        message,
                        name: reqwest_error_name(&err).to_string(),
                    },
                });
                return Err(err);
            }
        };
        pending.response_started();

        let cap = self.options.max_response_body_bytes;
        let mut prefix = VecDeque::new();
        let mut captured = 0usize;
        let mut complete = false;
        let mut pending_error = None;
        while captured < cap {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    captured += chunk.len();
                    prefix.push_back(chunk);
                }
                Ok(None) => {
                    complete = true;
                    break;
                }
                Err(err) => {
                    pending_error = Some(err);
                    break;
                }
            }
        }
        if cap == 0 && response.content_length() == Some(0) {
            complete = true;
        }

        let timings = pending.finish();
        let body: Vec<u8> = prefix.iter().flat_map(|c| c.iter().copied()).collect();
        let har_response = self.har_response(&response, &body, complete);
        let entry = HarEntry {
            started_date_time: started_at.to_rfc3339(),
            time: clock.elapsed().as_secs_f64() * 1000.0,
            request: har_request,
            response: har_response,
            cache: json!({}),
            timings,
        };
        debug!(
            correlation_id = %correlation_id,
            status = response.status().as_u16(),
            "HTTP response received"
        );
        self.record(TraceEventKind::HttpResponseReceived {
            correlation_id: correlation_id.clone(),
            har: entry,
        });

        Ok(HttpResponse {
            inner: response,
            prefix,
            pending_error,
            correlation_id,
        })
    }

    /// Masked request as a copy-pasteable curl command
    pub fn to_curl(&self, request: &Request) -> String {
        curl_command(&self.masker, request)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn record(&self, kind: TraceEventKind) {
        if let Some(trace) = self.ctx.trace() {
            trace.record(kind);
        }
    }

    fn har_request(&self, request: &Request) -> HarRequest {
        let (url, query_string) = self.masker.url(request.url());
        let body = request.body().and_then(|b| b.as_bytes());
        let post_data = body.map(|bytes| {
            let mime_type = content_type(request.headers())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let masked = self
                .masker
                .body(&mime_type, &String::from_utf8_lossy(bytes));
            let (text, comment) = truncate_text(&masked, self.options.max_request_body_bytes);
            HarPostData {
                mime_type,
                text,
                comment,
            }
        });

        HarRequest {
            method: request.method().to_string(),
            url,
            http_version: http_version(request.version()),
            headers: self.masker.headers(request.headers()),
            query_string,
            cookies: Vec::new(),
            headers_size: -1,
            body_size: match (request.body(), body) {
                (None, _) => 0,
                (Some(_), Some(bytes)) => bytes.len() as i64,
                (Some(_), None) => -1,
            },
            post_data,
        }
    }

    fn har_response(&self, response: &Response, body: &[u8], complete: bool) -> HarResponse {
        let cap = self.options.max_response_body_bytes;
        let truncated = !complete || body.len() > cap;
        let kept = &body[..body.len().min(cap)];
        let size = if complete {
            body.len() as i64
        } else {
            response.content_length().map(|l| l as i64).unwrap_or(-1)
        };
        let (text, encoding) = body_text(kept);
        let status = response.status();

        HarResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            http_version: http_version(response.version()),
            headers: self.masker.headers(response.headers()),
            cookies: Vec::new(),
            content: HarContent {
                size,
                mime_type: content_type(response.headers()).unwrap_or_default(),
                text: Some(text),
                encoding,
                comment: truncated.then(|| format!("Body truncated to {} bytes", kept.len())),
            },
            redirect_url: response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            headers_size: -1,
            body_size: size,
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("run_id", &self.ctx.run_id())
            .field("options", &self.options)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Response
// ═══════════════════════════════════════════

/// Response whose body replays the captured prefix, then the rest of the stream
pub struct HttpResponse {
    inner: Response,
    prefix: VecDeque<Bytes>,
    pending_error: Option<reqwest::Error>,
    correlation_id: String,
}

impl HttpResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Next body chunk, `None` at the end
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, reqwest::Error> {
        if let Some(chunk) = self.prefix.pop_front() {
            return Ok(Some(chunk));
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        self.inner.chunk().await
    }

    pub async fn bytes(mut self) -> Result<Bytes, reqwest::Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Body as UTF-8, invalid sequences replaced
    pub async fn text(self) -> Result<String, reqwest::Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ComponentError> {
        let bytes = self
            .bytes()
            .await
            .map_err(|e| ComponentError::from_reqwest(e, Some("Reading response body")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ComponentError::from_error(e, Some("Decoding response body")))
    }

    /// Classify a non-2xx response into a [`ComponentError`]
    pub async fn error_for_status(self) -> Result<Self, ComponentError> {
        let status = self.status();
        if status.is_success() || status.is_redirection() || status.is_informational() {
            return Ok(self);
        }
        let headers = self.headers().clone();
        let body = self.text().await.ok();
        Err(ComponentError::from_http_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            &headers,
            body.as_deref(),
        ))
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status())
            .field("url", &self.url().as_str())
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════

/// Masked curl command using the builtin sensitive-name list
pub fn to_curl(request: &Request) -> String {
    curl_command(&Masker::default(), request)
}

fn curl_command(masker: &Masker, request: &Request) -> String {
    let (url, _) = masker.url(request.url());
    let mut parts = vec!["curl".to_string()];
    if request.method() != Method::GET {
        parts.push(format!("-X {}", request.method()));
    }
    parts.push(shell_quote(&url));
    for header in masker.headers(request.headers()) {
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", header.name, header.value))));
    }
    if let Some(bytes) = request.body().and_then(|b| b.as_bytes()) {
        let mime = content_type(request.headers()).unwrap_or_default();
        let body = masker.body(&mime, &String::from_utf8_lossy(bytes));
        parts.push(format!("--data-raw {}", shell_quote(&body)));
    }
    parts.join(" \\\n  ")
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn http_version(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
    .to_string()
}

fn reqwest_error_name(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "TimeoutError"
    } else if err.is_connect() {
        "ConnectError"
    } else if err.is_redirect() {
        "RedirectError"
    } else if err.is_body() {
        "BodyError"
    } else if err.is_decode() {
        "DecodeError"
    } else if err.is_builder() {
        "BuilderError"
    } else {
        "RequestError"
    }
}

/// Truncate to at most `cap` bytes on a char boundary
fn truncate_text(text: &str, cap: usize) -> (String, Option<String>) {
    if text.len() <= cap {
        return (text.to_string(), None);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (
        text[..end].to_string(),
        Some(format!("Body truncated to {} of {} bytes", end, text.len())),
    )
}

/// UTF-8 text when possible (a split trailing char is dropped), else base64
fn body_text(bytes: &[u8]) -> (String, Option<String>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(e) if e.error_len().is_none() => (
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned(),
            None,
        ),
        Err(_) => (STANDARD.encode(bytes), Some("base64".to_string())),
    }
}
