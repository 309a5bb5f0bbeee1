//! Integration test: AI gateway against a local mock of the completions API.
//!
//! Each test spins up an axum server on 127.0.0.1:0 that plays one upstream
//! behaviour, then checks how the gateway normalizes it.

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use mindmate_core::{AiConfig, AiGateway, Error};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "sk-or-test-0123456789";

async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}

fn gateway(base_url: String, timeout_ms: u64) -> AiGateway {
    AiGateway::new(AiConfig {
        api_key: Some(KEY.to_string()),
        base_url,
        timeout_ms,
        ..AiConfig::default()
    })
    .unwrap()
}

fn completions(handler: axum::routing::MethodRouter) -> Router {
    Router::new().route("/api/v1/chat/completions", handler)
}

#[tokio::test]
async fn successful_completion_sends_expected_request() {
    let seen: Arc<Mutex<Option<(HeaderMap, Value)>>> = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let app = completions(post(move |headers: HeaderMap, Json(body): Json<Value>| {
        let captured = Arc::clone(&captured);
        async move {
            *captured.lock().unwrap() = Some((headers, body));
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Try a short walk." } }]
            }))
        }
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let reply = gw.chat("  I feel restless tonight  ").await.unwrap();
    assert_eq!(reply, "Try a short walk.");

    let (headers, body) = seen.lock().unwrap().take().expect("upstream was called");
    assert_eq!(headers[header::AUTHORIZATION], format!("Bearer {}", KEY).as_str());
    assert_eq!(headers["x-title"], "MindMate");
    assert_eq!(headers["http-referer"], "https://mind-mate-frontend-lime.vercel.app");
    assert_eq!(body["model"], "openai/gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "  I feel restless tonight  ");
}

#[tokio::test]
async fn message_whitespace_reaches_upstream_verbatim() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let app = completions(post(move |Json(body): Json<Value>| {
        let captured = Arc::clone(&captured);
        async move {
            *captured.lock().unwrap() = Some(body);
            Json(json!({ "choices": [{ "message": { "content": "Noted." } }] }))
        }
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let message = "  line one\n\n    indented line two\t\n";
    gw.chat(message).await.unwrap();

    let body = seen.lock().unwrap().take().expect("upstream was called");
    assert_eq!(body["messages"][0]["content"], message);
}

#[tokio::test]
async fn rate_limit_maps_to_rate_limited_with_retry_after() {
    let app = completions(post(|| async {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "7")],
            "slow down",
        )
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let err = gw.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { retry_after: Some(7), .. }), "{:?}", err);
    assert_eq!(err.status_code(), 429);
}

#[tokio::test]
async fn auth_failure_is_configuration_error_without_credential() {
    let app = completions(post(|headers: HeaderMap| async move {
        // Echo the bearer back, as some providers do in error bodies.
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (StatusCode::UNAUTHORIZED, format!("invalid credential: {}", auth))
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let err = gw.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(err.status_code(), 500);
    assert!(!err.to_string().contains(KEY));
    assert!(!err.public_message().contains(KEY));
    assert!(!format!("{:?}", err).contains(KEY));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let app = completions(post(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Json(json!({ "choices": [{ "message": { "content": "too late" } }] }))
    }));
    let gw = gateway(spawn_upstream(app).await, 200);

    let err = gw.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{:?}", err);
    assert_eq!(err.status_code(), 504);
}

#[tokio::test]
async fn empty_completion_is_protocol_error() {
    let app = completions(post(|| async {
        Json(json!({ "choices": [{ "message": { "content": "" } }] }))
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let err = gw.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::UpstreamProtocol(_)));
    assert_eq!(err.public_message(), "Invalid response from AI service");
}

#[tokio::test]
async fn server_error_maps_to_upstream_unavailable_with_status() {
    let app = completions(post(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("model crashed near {}", KEY))
    }));
    let gw = gateway(spawn_upstream(app).await, 5_000);

    let err = gw.chat("hello").await.unwrap_err();
    match &err {
        Error::UpstreamUnavailable { status, detail } => {
            assert_eq!(*status, Some(500));
            assert!(detail.contains("[REDACTED]"));
            assert!(!detail.contains(KEY));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn unreachable_upstream_is_unavailable_without_status() {
    // Reserve a port, then free it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gw = gateway(format!("http://{}/api/v1", addr), 5_000);
    let err = gw.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable { status: None, .. }), "{:?}", err);
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn precondition_failures_make_no_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = completions(post(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Json(json!({ "choices": [{ "message": { "content": "hi" } }] }))
        }
    }));
    let base = spawn_upstream(app).await;

    let err = gateway(base.clone(), 5_000).chat("").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let keyless = AiGateway::new(AiConfig {
        api_key: None,
        base_url: base,
        ..AiConfig::default()
    })
    .unwrap();
    assert!(!keyless.is_configured());
    let err = keyless.chat("hello").await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
