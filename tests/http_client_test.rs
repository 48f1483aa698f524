//! # HTTP Instrumentation Tests
//!
//! Runs the instrumented client against a wiremock server and inspects the
//! trace events it records:
//! - request/response pairing by correlation id
//! - header, query and body masking
//! - response capture cap with the full body preserved for the caller
//! - error events for transport failures, with the URL masked
//! - timing queue balanced when a fetch is cancelled

use std::sync::Arc;
use std::time::Duration;

use component_sdk::context::{
    create_execution_context, ExecutionContext, ExecutionContextOptions, MemoryTraceSink,
    TraceEventKind,
};
use component_sdk::http::{
    create_http_client, FetchOptions, HttpClient, HttpClientOptions, InstantTimingRecorder,
    NoopTimingRecorder,
};
use component_sdk::ComponentError;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// TEST HELPERS
// ============================================================================

fn traced_client(options: HttpClientOptions) -> (HttpClient, Arc<MemoryTraceSink>, ExecutionContext) {
    let sink = Arc::new(MemoryTraceSink::new());
    let ctx = create_execution_context(
        ExecutionContextOptions::new("run-http", "http-node").trace_sink(sink.clone()),
    );
    let client = create_http_client(&ctx, options).unwrap();
    (client, sink, ctx)
}

fn trace_text(sink: &MemoryTraceSink) -> String {
    sink.to_json().to_string()
}

// ============================================================================
// REQUEST / RESPONSE EVENTS
// ============================================================================

#[tokio::test]
async fn test_request_and_response_share_correlation_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
        .mount(&server)
        .await;

    let (client, sink, _ctx) = traced_client(HttpClientOptions::default());
    let response = client
        .send(client.get(format!("{}/items", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let correlation_id = response.correlation_id().to_string();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"items": [1, 2]}));

    let events = sink.events();
    let types: Vec<_> = events.iter().map(|e| e.kind.type_name()).collect();
    assert_eq!(types, ["HTTP_REQUEST_SENT", "HTTP_RESPONSE_RECEIVED"]);
    for event in &events {
        assert_eq!(event.kind.correlation_id(), Some(correlation_id.as_str()));
        assert_eq!(event.run_id, "run-http");
        assert_eq!(event.node_ref, "http-node");
    }

    let TraceEventKind::HttpResponseReceived { har, .. } = &events[1].kind else {
        panic!("expected response event");
    };
    assert_eq!(har.response.status, 200);
    assert_eq!(har.request.method, "GET");
    assert!(har.response.content.text.as_deref().unwrap_or_default().contains("items"));
}

#[tokio::test]
async fn test_explicit_correlation_id_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (client, sink, _ctx) = traced_client(HttpClientOptions::default());
    let request = client.get(server.uri()).build().unwrap();
    let response = client
        .fetch_with(
            request,
            FetchOptions {
                correlation_id: Some("corr-42".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.correlation_id(), "corr-42");
    assert!(sink
        .events()
        .iter()
        .all(|e| e.kind.correlation_id() == Some("corr-42")));
}

// ============================================================================
// MASKING
// ============================================================================

#[tokio::test]
async fn test_sensitive_values_never_reach_the_trace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=server-cookie-value")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;

    let (client, sink, _ctx) = traced_client(HttpClientOptions {
        sensitive_headers: vec!["x-tenant".into()],
        ..HttpClientOptions::default()
    });
    let builder = client
        .post(format!("{}/login?api_key=query-secret&page=1", server.uri()))
        .header("AUTHORIZATION", "Bearer header-secret")
        .header("X-Api-Key", "key-secret")
        .header("X-Tenant-Id", "tenant-secret")
        .json(&json!({"user": "bob", "password": "body-secret"}));
    client.send(builder).await.unwrap().bytes().await.unwrap();

    let text = trace_text(&sink);
    for secret in [
        "header-secret",
        "key-secret",
        "tenant-secret",
        "query-secret",
        "body-secret",
        "server-cookie-value",
    ] {
        assert!(!text.contains(secret), "{} leaked into trace", secret);
    }
    assert!(text.contains("bob"));
    assert!(text.contains("page"));
}

#[tokio::test]
async fn test_curl_rendering_is_masked() {
    let (client, _sink, _ctx) = traced_client(HttpClientOptions::default());
    let request = client
        .get("https://api.example.com/v1/me")
        .header("Authorization", "Bearer live-token")
        .build()
        .unwrap();
    let curl = client.to_curl(&request);
    assert!(curl.contains("https://api.example.com/v1/me"));
    assert!(!curl.contains("live-token"));
}

// ============================================================================
// BODY CAPTURE
// ============================================================================

#[tokio::test]
async fn test_capture_is_capped_but_caller_gets_full_body() {
    let body = "x".repeat(64 * 1024);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let (client, sink, _ctx) = traced_client(HttpClientOptions {
        max_response_body_bytes: 1024,
        timing: Some(Arc::new(NoopTimingRecorder)),
        ..HttpClientOptions::default()
    });
    let response = client.send(client.get(server.uri())).await.unwrap();
    let text = response.text().await.unwrap();
    assert_eq!(text.len(), body.len());

    let events = sink.of_type("HTTP_RESPONSE_RECEIVED");
    let TraceEventKind::HttpResponseReceived { har, .. } = &events[0].kind else {
        panic!("expected response event");
    };
    let captured = har.response.content.text.as_deref().unwrap_or_default();
    assert!(captured.len() <= 1024);
    assert!(har.response.content.comment.is_some());
    assert_eq!(har.timings.wait, -1.0);
}

// ============================================================================
// ERRORS
// ============================================================================

#[tokio::test]
async fn test_connection_failure_records_error_event() {
    let (client, sink, _ctx) = traced_client(HttpClientOptions::default());
    // Port 9 (discard) is closed on test hosts
    let err = client
        .send(client.get("http://127.0.0.1:9/unreachable"))
        .await
        .unwrap_err();
    assert!(err.is_connect() || err.is_request());

    let events = sink.events();
    let types: Vec<_> = events.iter().map(|e| e.kind.type_name()).collect();
    assert_eq!(types, ["HTTP_REQUEST_SENT", "HTTP_REQUEST_ERROR"]);
    let TraceEventKind::HttpRequestError { error, .. } = &events[1].kind else {
        panic!("expected error event");
    };
    assert!(!error.message.is_empty());
    assert!(!error.name.is_empty());
}

#[tokio::test]
async fn test_error_event_masks_the_url() {
    let (client, sink, _ctx) = traced_client(HttpClientOptions::default());
    let err = client
        .send(client.get("http://127.0.0.1:9/x?api_key=query-secret-77&page=3"))
        .await
        .unwrap_err();

    let text = trace_text(&sink);
    assert!(!text.contains("query-secret-77"), "secret leaked: {}", text);
    let events = sink.of_type("HTTP_REQUEST_ERROR");
    let TraceEventKind::HttpRequestError { error, .. } = &events[0].kind else {
        panic!("expected error event");
    };
    assert!(error.message.contains("page=3"));

    let classified = ComponentError::from_reqwest(err, Some("fetching"));
    let payload = serde_json::to_string(&classified.to_payload()).unwrap();
    assert!(!payload.contains("query-secret-77"), "{}", payload);
    assert!(classified.is_retryable());
}

// ============================================================================
// TIMING
// ============================================================================

#[tokio::test]
async fn test_cancelled_fetch_leaves_no_pending_timing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let recorder = Arc::new(InstantTimingRecorder::new());
    let (client, _sink, _ctx) = traced_client(HttpClientOptions {
        timing: Some(recorder.clone()),
        ..HttpClientOptions::default()
    });

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        client.send(client.get(server.uri())),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(recorder.pending_count(), 0);

    client.send(client.get(server.uri())).await.unwrap();
    assert_eq!(recorder.pending_count(), 0);
}

#[tokio::test]
async fn test_error_for_status_classifies_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let (client, _sink, _ctx) = traced_client(HttpClientOptions::default());
    let err = client
        .send(client.get(server.uri()))
        .await
        .unwrap()
        .error_for_status()
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), "RateLimitError");
    assert_eq!(err.retry_delay_ms(), Some(30_000));
}
