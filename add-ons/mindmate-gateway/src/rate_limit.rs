//! Per-client request budget: a token bucket per client address.
//!
//! Each bucket holds up to `max_requests` tokens and refills continuously so a
//! drained bucket is full again after `window_secs`.

use crate::app::SharedState;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use mindmate_core::RateLimitConfig;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Buckets idle for a full window are dropped once this many clients are tracked.
const PRUNE_THRESHOLD: usize = 10_000;

struct Bucket {
    tokens: f64,
    last: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
    trust_forwarded_for: bool,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_requests.max(1));
        let window = config.window().max(Duration::from_secs(1));
        Self {
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            window,
            trust_forwarded_for: config.trust_forwarded_for,
            buckets: DashMap::new(),
        }
    }

    /// Takes one token for `client`. On refusal returns the seconds until one is available.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), u64> {
        if self.buckets.len() > PRUNE_THRESHOLD {
            let window = self.window;
            self.buckets
                .retain(|_, b| now.saturating_duration_since(b.last) < window);
        }

        let mut bucket = self.buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let wait = ((1.0 - bucket.tokens) / self.refill_per_sec).ceil() as u64;
            Err(wait.max(1))
        }
    }

    /// Client address: the first `X-Forwarded-For` hop when trusted, else the peer.
    fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Rejects with 429 and `Retry-After` once the client's budget is spent.
pub async fn enforce(State(state): State<SharedState>, request: Request<Body>, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = limiter.client_key(request.headers(), peer);

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(client = %client, retry_after, "[GATEWAY] Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "success": false, "error": RATE_LIMIT_MESSAGE })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64, trust_forwarded_for: bool) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests,
            window_secs,
            trust_forwarded_for,
        })
    }

    #[test]
    fn budget_is_per_client() {
        let rl = limiter(2, 60, false);
        let now = Instant::now();
        assert!(rl.check_at("10.0.0.1", now).is_ok());
        assert!(rl.check_at("10.0.0.1", now).is_ok());
        assert_eq!(rl.check_at("10.0.0.1", now), Err(30));
        assert!(rl.check_at("10.0.0.2", now).is_ok());
    }

    #[test]
    fn tokens_refill_over_the_window() {
        let rl = limiter(4, 60, false);
        let start = Instant::now();
        for _ in 0..4 {
            assert!(rl.check_at("a", start).is_ok());
        }
        assert!(rl.check_at("a", start).is_err());
        // one token every 15s
        assert!(rl.check_at("a", start + Duration::from_secs(16)).is_ok());
        assert!(rl.check_at("a", start + Duration::from_secs(16)).is_err());
        // a full window restores the whole budget, never more
        let later = start + Duration::from_secs(600);
        for _ in 0..4 {
            assert!(rl.check_at("a", later).is_ok());
        }
        assert!(rl.check_at("a", later).is_err());
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer: SocketAddr = "192.0.2.7:51000".parse().unwrap();

        assert_eq!(limiter(1, 60, false).client_key(&headers, Some(peer)), "192.0.2.7");
        assert_eq!(limiter(1, 60, true).client_key(&headers, Some(peer)), "203.0.113.9");
        assert_eq!(limiter(1, 60, true).client_key(&HeaderMap::new(), None), "unknown");
    }
}
