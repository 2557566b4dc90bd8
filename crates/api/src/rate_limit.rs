//! Per-client request rate limiting.
//!
//! Fixed-window token buckets keyed by the `X-User-Id` header, falling
//! back to the peer address when the header is absent. Each client gets
//! a full bucket per window; requests beyond the budget are rejected
//! with `429 Too Many Requests`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

struct TokenBucket {
    tokens: u64,
    window_start: Instant,
}

/// Shared rate limiter state for the middleware layer.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    capacity: u64,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter allowing `per_minute` requests per client per minute.
    pub fn per_minute(per_minute: u64) -> Self {
        Self::new(per_minute, Duration::from_secs(60))
    }

    pub fn new(capacity: u64, window: Duration) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity,
            window,
        }
    }

    /// Takes one token from the client's bucket, refilling it first if
    /// the current window has elapsed. Returns false when the bucket is
    /// empty.
    pub async fn try_consume(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.to_string()).or_insert(TokenBucket {
            tokens: self.capacity,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.tokens = self.capacity;
            bucket.window_start = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            metrics::counter!("rate_limit_rejected_total").increment(1);
            false
        }
    }
}

fn client_key(request: &Request) -> String {
    if let Some(user_id) = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
    {
        return user_id.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware enforcing the per-client budget.
pub async fn enforce(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    if limiter.try_consume(&key).await {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "rate limit exceeded");
        let body = serde_json::json!({ "error": "Rate limit exceeded" });
        (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response()
    }
}
