//! Router assembly: routes, CORS, rate limiting, security headers, body limit and access logging.

use crate::error::ApiError;
use crate::handlers::{ai, journal, mood};
use crate::rate_limit::{self, RateLimiter};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mindmate_core::{AiGateway, AppConfig, CacheState, EntryStore, Error, MoodClassifier, RunMode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// JSON request bodies up to 10 MiB.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// JSON-only API: nothing may be loaded or framed from a response.
const CONTENT_SECURITY_POLICY: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'";

const AVAILABLE_ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /health",
    "GET /api/journal",
    "POST /api/journal",
    "POST /api/journal/analyze",
    "GET /api/journal/:id",
    "PUT /api/journal/:id",
    "DELETE /api/journal/:id",
    "GET /api/mood",
    "POST /api/mood",
    "POST /api/ai/chat",
    "GET /api/ai/test",
];

pub struct AppState {
    pub mode: RunMode,
    pub store: EntryStore,
    pub ai: AiGateway,
    pub cors_origins: Vec<String>,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<RateLimiter>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Builds the store and gateway. Nothing connects until the first request.
    pub fn from_config(config: &AppConfig) -> mindmate_core::Result<Self> {
        Ok(Self {
            mode: config.mode,
            store: EntryStore::from_config(&config.store, MoodClassifier::default())?,
            ai: AiGateway::new(config.ai.clone())?,
            cors_origins: config.cors_origins.clone(),
            rate_limiter: config
                .rate_limit
                .enabled
                .then(|| RateLimiter::new(&config.rate_limit)),
        })
    }

    /// Logs `error` and wraps it for the response in the current mode.
    pub fn reject(&self, error: Error) -> ApiError {
        if error.is_server_error() {
            tracing::error!(kind = error.kind(), "[GATEWAY] {}", error);
        } else {
            tracing::debug!(kind = error.kind(), "[GATEWAY] {}", error);
        }
        ApiError::new(error, self.mode)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("[GATEWAY] Ignoring unparseable CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn build_app(state: SharedState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    let limiter_state = Arc::clone(&state);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/api/journal", get(journal::list_entries).post(journal::create_entry))
        .route("/api/journal/analyze", post(journal::analyze))
        .route(
            "/api/journal/:id",
            get(journal::get_entry)
                .put(journal::update_entry)
                .delete(journal::delete_entry),
        )
        .route("/api/mood", get(mood::list_moods).post(mood::record_mood))
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/ai/test", get(ai::test_route))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(axum::middleware::from_fn_with_state(limiter_state, rate_limit::enforce))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin"),
        ))
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        "[GATEWAY] {} {} -> {} ({}ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn banner(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "message": "MindMate API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.mode.as_str(),
        "version": mindmate_core::version(),
    }))
}

/// Reports the cache state; never triggers a connection attempt.
async fn health(State(state): State<SharedState>) -> Json<Value> {
    let database = match state.store.cache().status().await.state {
        CacheState::Connected => "connected",
        CacheState::Connecting => "connecting",
        CacheState::Uninitialized => "disconnected",
    };
    Json(json!({
        "status": "ok",
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "path": uri.path(),
            "method": method.as_str(),
            "availableEndpoints": AVAILABLE_ENDPOINTS,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
