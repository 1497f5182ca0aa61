//! Per-client rate limiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::response::AppError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Request allowance for one client.
///
/// Holds up to `capacity` requests and regains `refill_per_sec` of them
/// each second, counted lazily whenever the bucket is touched.
#[derive(Debug, Clone)]
struct ClientAllowance {
    available: f64,
    capacity: f64,
    refill_per_sec: f64,
    touched: Instant,
}

impl ClientAllowance {
    fn full(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            available: capacity,
            capacity,
            refill_per_sec,
            touched: Instant::now(),
        }
    }

    fn available_at(&self, now: Instant) -> f64 {
        let idle = now.saturating_duration_since(self.touched).as_secs_f64();
        (self.available + idle * self.refill_per_sec).min(self.capacity)
    }

    /// Spend one request if any is left.
    fn take(&mut self) -> bool {
        let now = Instant::now();
        self.available = self.available_at(now);
        self.touched = now;

        let allowed = self.available >= 1.0;
        if allowed {
            self.available -= 1.0;
        }
        allowed
    }

    /// A full allowance carries no state worth keeping.
    fn is_full_at(&self, now: Instant) -> bool {
        self.available_at(now) >= self.capacity
    }
}

/// Shared limiter state, one bucket per client key.
#[derive(Debug)]
pub struct RateLimiterState {
    buckets: DashMap<String, ClientAllowance>,
    refill_per_sec: f64,
    burst: f64,
    trust_proxy_headers: bool,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig, trust_proxy_headers: bool) -> Self {
        Self {
            buckets: DashMap::new(),
            refill_per_sec: f64::from(config.requests_per_minute) / 60.0,
            burst: f64::from(config.burst.max(1)),
            trust_proxy_headers,
        }
    }

    /// Take one token for `key`.
    pub fn check(&self, key: &str) -> bool {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| ClientAllowance::full(self.burst, self.refill_per_sec))
            .take()
    }

    /// Client key: the nearest proxy's X-Forwarded-For entry when proxy
    /// headers are trusted, else the peer IP.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = self
            .trust_proxy_headers
            .then(|| headers.get(X_FORWARDED_FOR))
            .flatten()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        forwarded
            .or(peer.map(|addr| addr.ip()))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that would be full again by now; they are
    /// indistinguishable from fresh ones.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_full_at(now));
        before - self.buckets.len()
    }

    /// Periodically prune idle buckets until shutdown is signalled.
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.prune_idle();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.tracked_clients(), "Pruned idle rate limit buckets");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit cleanup stopped");
                        break;
                    }
                }
            }
        })
    }
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.client_key(request.headers(), peer);

    if state.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        AppError::RateLimited.into_response()
    }
}
