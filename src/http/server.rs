//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every page, API and debug route
//! - Wire up the boundary middleware in a fixed order
//! - Bind the server to a plain TCP or rustls listener
//! - Run the rate-limit bucket cleanup alongside the server
//!
//! # Layer Order
//! ```text
//! RequestIdLayer          (outermost: every later layer sees the ID)
//!     → TraceLayer
//!     → track_requests    (metrics)
//!     → security headers  (covers rejections, 404s, panics)
//!     → API error shaping
//!     → CatchPanicLayer
//!     → host guard        (400 before anything else runs)
//!     → TimeoutLayer
//!     → RequestBodyLimitLayer
//!     → rate limiting     (production only)
//!     → handlers
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    middleware,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, ConfigSnapshot, NodesConfig};
use crate::http::debug::{self, DebugLog};
use crate::http::handlers;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response::{api_error_middleware, handle_panic};
use crate::lifecycle::Shutdown;
use crate::nodes::directory::SEARCH_PATTERN;
use crate::nodes::NodeDirectory;
use crate::observability::metrics;
use crate::params::Pattern;
use crate::security::headers::security_headers_middleware;
use crate::security::host_guard::host_guard_middleware;
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{BodySizeGuard, HostGuard, RateLimiterState, SecurityHeaderPolicy};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ConfigSnapshot>,
    pub nodes: Arc<NodeDirectory>,
    pub nodes_config: NodesConfig,
    pub search_pattern: Arc<Pattern>,
    pub body_guard: BodySizeGuard,
    pub debug_log: Arc<DebugLog>,
    pub data_file: Option<PathBuf>,
}

/// HTTP server for the web UI.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    rate_limiter: Option<Arc<RateLimiterState>>,
}

impl HttpServer {
    /// Create a new HTTP server serving `nodes`.
    pub fn new(config: AppConfig, nodes: NodeDirectory) -> Self {
        let snapshot = Arc::new(config.snapshot());

        let state = AppState {
            snapshot: snapshot.clone(),
            nodes: Arc::new(nodes),
            nodes_config: config.nodes.clone(),
            search_pattern: Arc::new(
                Pattern::new(SEARCH_PATTERN).expect("search pattern is a valid regex"),
            ),
            body_guard: BodySizeGuard::from_snapshot(&snapshot),
            debug_log: Arc::new(DebugLog::new(config.debug.log_buffer_size)),
            data_file: config.nodes.data_file.clone(),
        };
        match state.body_guard.max() {
            Some(max) => tracing::info!(max_body_bytes = max, "Request body limit set"),
            None => tracing::warn!("Request body size is unlimited"),
        }

        // Debug-like deployments are local; throttling only gets in the way.
        let rate_limiter = (config.rate_limit.enabled && !snapshot.debug_like).then(|| {
            Arc::new(RateLimiterState::new(
                &config.rate_limit,
                snapshot.trust_proxy_headers,
            ))
        });

        let router = Self::build_router(&config, &snapshot, state, rate_limiter.clone());
        Self {
            router,
            config,
            rate_limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &AppConfig,
        snapshot: &ConfigSnapshot,
        state: AppState,
        rate_limiter: Option<Arc<RateLimiterState>>,
    ) -> Router {
        let mut routes = Router::new()
            .route("/", get(handlers::index))
            .route("/nodes", get(handlers::nodes_page))
            .route("/api/nodes/data", get(handlers::nodes_data))
            .route("/api/meshtastic/packet-types", get(handlers::packet_types))
            .route("/health", get(handlers::health))
            .route("/info", get(handlers::info));

        if snapshot.debug_like {
            tracing::warn!("Debug-like mode: relaxed CSP, browser debug sink enabled");
            routes = routes.merge(debug::routes());
        }

        let router = routes.fallback(handlers::not_found).with_state(state);
        apply_layers(router, config, snapshot, rate_limiter)
    }

    /// The fully layered router; handy for driving requests in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn spawn_background_tasks(&self, shutdown: &Shutdown) {
        if let Some(limiter) = &self.rate_limiter {
            let interval = Duration::from_secs(self.config.rate_limit.cleanup_interval_secs.max(1));
            limiter.clone().spawn_cleanup(interval, shutdown.subscribe());
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background_tasks(&shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background_tasks(&shutdown);

        let handle = axum_server::Handle::new();
        let signal = shutdown.wait();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            signal.await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Wrap `router` in the boundary middleware, innermost first.
#[allow(deprecated)]
pub(crate) fn apply_layers(
    mut router: Router,
    config: &AppConfig,
    snapshot: &ConfigSnapshot,
    rate_limiter: Option<Arc<RateLimiterState>>,
) -> Router {
    if let Some(limiter) = rate_limiter {
        router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }
    if let Some(max) = snapshot.max_content_length {
        router = router.layer(RequestBodyLimitLayer::new(max));
    }

    let host_guard = Arc::new(HostGuard::new(snapshot));
    if !host_guard.is_enabled() {
        tracing::info!("Host allowlist empty, accepting any Host");
    }
    let header_policy = Arc::new(SecurityHeaderPolicy::new(snapshot));

    router
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn_with_state(host_guard, host_guard_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(api_error_middleware))
        .layer(middleware::from_fn_with_state(
            header_policy,
            security_headers_middleware,
        ))
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request.request_id_str(),
            )
        }))
        .layer(RequestIdLayer)
}
