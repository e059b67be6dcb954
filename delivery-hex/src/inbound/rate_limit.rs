//! Rate limiting middleware using Governor.
//!
//! Implements per-client rate limiting with a token bucket algorithm.
//! Requests presenting a session cookie are counted against that session.
//! Requests that arrive without one are counted against the peer address,
//! since a client can always drop its cookie to get a fresh session.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};

use delivery_types::SessionId;

use super::session::IssuedSession;

/// Bucket shared by cookieless requests whose peer address is unknown.
const ANONYMOUS_BUCKET: &str = "anonymous";

struct Bucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    last_seen: Instant,
}

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    /// Per-client buckets
    limiters: DashMap<String, Bucket>,
    /// Quota for new buckets
    quota: Quota,
    period: Duration,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Creates a new rate limiter state.
    ///
    /// # Arguments
    /// * `requests` - Number of requests allowed per period (at least 1)
    /// * `period` - Time period for the quota
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiters: DashMap::new(),
            quota,
            period,
        }
    }

    /// Checks if a request should be rate limited.
    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        let mut bucket = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                limiter: RateLimiter::direct(self.quota),
                last_seen: Instant::now(),
            });
        bucket.last_seen = Instant::now();

        bucket.limiter.check().is_ok()
    }

    /// Drops buckets that have been idle for a whole period and returns
    /// how many remain.
    ///
    /// An idle bucket has refilled by then, so dropping it never loosens
    /// the limit.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        self.limiters
            .retain(|_, bucket| now.duration_since(bucket.last_seen) < self.period);
        self.limiters.len()
    }

    /// Number of tracked buckets.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Starts a task that sweeps idle buckets once per period.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        let every = state.period.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let remaining = state.sweep();
                tracing::debug!(remaining, "swept idle rate limit buckets");
            }
        })
    }
}

/// Picks the bucket a request is counted against.
///
/// A session the server just issued is not trusted as a key; those requests
/// fall back to the peer address.
fn bucket_key(request: &Request<Body>) -> String {
    let extensions = request.extensions();
    match extensions.get::<SessionId>() {
        Some(session) if extensions.get::<IssuedSession>().is_none() => {
            format!("session:{}", session.as_str())
        }
        _ => match extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => format!("peer:{}", addr.ip()),
            None => ANONYMOUS_BUCKET.to_string(),
        },
    }
}

/// Rate limiting middleware.
/// Expects the session middleware to have attached a `SessionId` first.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Skip rate limiting for health endpoint
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = bucket_key(&request);

    if !limiter.check(&key) {
        tracing::warn!(bucket = %key, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": 429,
                "retry_after_seconds": limiter.period.as_secs()
            })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session: Option<&str>, issued: bool, peer: Option<&str>) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/api/parcels")
            .body(Body::empty())
            .unwrap();
        if let Some(s) = session {
            request.extensions_mut().insert(SessionId::new(s));
        }
        if issued {
            request.extensions_mut().insert(IssuedSession);
        }
        if let Some(addr) = peer {
            let addr: SocketAddr = addr.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn test_burst_then_reject() {
        let state = RateLimiterState::new(3, Duration::from_secs(60));

        assert!(state.check("s1"));
        assert!(state.check("s1"));
        assert!(state.check("s1"));
        assert!(!state.check("s1"));
    }

    #[test]
    fn test_sessions_have_separate_buckets() {
        let state = RateLimiterState::new(1, Duration::from_secs(60));

        assert!(state.check("s1"));
        assert!(!state.check("s1"));
        assert!(state.check("s2"));
    }

    #[test]
    fn test_zero_requests_allows_one() {
        let state = RateLimiterState::new(0, Duration::from_secs(60));

        assert!(state.check("s1"));
        assert!(!state.check("s1"));
    }

    #[test]
    fn test_bucket_key_selection() {
        assert_eq!(
            bucket_key(&request(Some("abc"), false, Some("10.0.0.1:5000"))),
            "session:abc"
        );
        // Freshly issued sessions count against the peer, whatever the port
        assert_eq!(
            bucket_key(&request(Some("fresh-1"), true, Some("10.0.0.1:5000"))),
            "peer:10.0.0.1"
        );
        assert_eq!(
            bucket_key(&request(Some("fresh-2"), true, Some("10.0.0.1:6000"))),
            "peer:10.0.0.1"
        );
        assert_eq!(
            bucket_key(&request(Some("fresh-3"), true, None)),
            ANONYMOUS_BUCKET
        );
        assert_eq!(bucket_key(&request(None, false, None)), ANONYMOUS_BUCKET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_idle_buckets() {
        let state = RateLimiterState::new(5, Duration::from_secs(60));
        state.check("idle");
        tokio::time::advance(Duration::from_secs(30)).await;
        state.check("active");

        assert_eq!(state.sweep(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(state.sweep(), 1);
        assert!(state.limiters.contains_key("active"));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(state.sweep(), 0);
        assert!(state.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_evicts_on_schedule() {
        let state = Arc::new(RateLimiterState::new(5, Duration::from_secs(60)));
        for i in 0..50 {
            state.check(&format!("peer:10.0.0.{}", i));
        }
        assert_eq!(state.len(), 50);

        let sweeper = state.spawn_sweeper();
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(state.is_empty());
        sweeper.abort();
    }
}
