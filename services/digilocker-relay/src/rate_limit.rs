//! Per-client sliding-window rate limiting
//!
//! Each client IP gets `max_requests` per `window`. Every response carries
//! `RateLimit-Limit`, `RateLimit-Remaining` and `RateLimit-Reset`; requests
//! over budget are answered 429 without reaching a handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ApiError;

/// Above this many tracked clients, idle entries are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

/// Budget left after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: usize,
    pub remaining: usize,
    /// Seconds until the oldest counted request leaves the window
    pub reset_secs: u64,
    pub allowed: bool,
}

#[derive(Debug)]
pub struct RateLimiter {
    inner: Mutex<HashMap<String, Vec<Instant>>>,
    max: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max,
            window,
        }
    }

    pub async fn check(&self, key: &str) -> Quota {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let window = self.window;

        if guard.len() > SWEEP_THRESHOLD {
            guard.retain(|_, hits| {
                hits.last()
                    .is_some_and(|t| now.saturating_duration_since(*t) < window)
            });
        }

        let hits = guard.entry(key.to_string()).or_default();
        hits.retain(|t| now.saturating_duration_since(*t) < window);

        let allowed = hits.len() < self.max;
        if allowed {
            hits.push(now);
        }
        let reset_secs = hits
            .first()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or(window)
            .as_secs();

        Quota {
            limit: self.max,
            remaining: self.max.saturating_sub(hits.len()),
            reset_secs,
            allowed,
        }
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert("ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(quota.reset_secs));
}

/// Middleware enforcing the limiter for every request.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let quota = limiter.check(&key).await;

    let mut response = if quota.allowed {
        next.run(request).await
    } else {
        warn!(client = %key, "rate limit exceeded");
        ApiError::TooManyRequests.into_response()
    };
    insert_headers(response.headers_mut(), &quota);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for expected_remaining in [2, 1, 0] {
            let quota = limiter.check("10.0.0.1").await;
            assert!(quota.allowed);
            assert_eq!(quota.remaining, expected_remaining);
        }
        let quota = limiter.check("10.0.0.1").await;
        assert!(!quota.allowed);
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.limit, 3);
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1").await.allowed);
        assert!(limiter.check("10.0.0.2").await.allowed);
        assert!(!limiter.check("10.0.0.1").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("k").await.allowed);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.check("k").await.allowed);
        assert!(!limiter.check("k").await.allowed);

        tokio::time::advance(Duration::from_secs(31)).await;
        let quota = limiter.check("k").await;
        assert!(quota.allowed, "first hit left the window");
        assert!(!limiter.check("k").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_counts_down_to_oldest_expiry() {
        let limiter = RateLimiter::new(5, Duration::from_secs(300));
        assert_eq!(limiter.check("k").await.reset_secs, 300);
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(limiter.check("k").await.reset_secs, 200);
    }

    #[test]
    fn headers_carry_quota() {
        let mut headers = HeaderMap::new();
        insert_headers(
            &mut headers,
            &Quota {
                limit: 500,
                remaining: 499,
                reset_secs: 300,
                allowed: true,
            },
        );
        assert_eq!(headers["ratelimit-limit"], "500");
        assert_eq!(headers["ratelimit-remaining"], "499");
        assert_eq!(headers["ratelimit-reset"], "300");
    }
}
