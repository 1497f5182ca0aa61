//! Host allowlist admission filter.
//!
//! Rejects requests whose Host is not in the configured allowlist before
//! any other per-request work happens. An empty allowlist disables the
//! check.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::ConfigSnapshot;
use crate::http::response::AppError;

const X_FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Clone, Default)]
pub struct HostGuard {
    allowed: HashSet<String>,
    trust_proxy_headers: bool,
}

impl HostGuard {
    pub fn new(snapshot: &ConfigSnapshot) -> Self {
        Self {
            allowed: snapshot.allowed_hosts.clone(),
            trust_proxy_headers: snapshot.trust_proxy_headers,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Host the request claims to be for. With proxy trust, the nearest
    /// proxy's X-Forwarded-Host wins over the request's own host.
    pub fn effective_host<'a>(&self, headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
        let forwarded = self
            .trust_proxy_headers
            .then(|| headers.get(X_FORWARDED_HOST))
            .flatten()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        forwarded.or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .or_else(|| uri.authority().map(|a| a.as_str()))
        })
    }

    /// Admit or reject a request.
    pub fn admit(&self, headers: &HeaderMap, uri: &Uri) -> Result<(), AppError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let raw = self.effective_host(headers, uri).unwrap_or_default();
        let host = normalize_host(raw);
        if self.allowed.contains(&host) {
            Ok(())
        } else {
            tracing::warn!(host = %raw, "Rejected request for unlisted host");
            Err(AppError::HostNotAllowed(host))
        }
    }
}

/// Drop any port and lower-case. Bracketed IPv6 literals lose their brackets.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = match raw.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or_default(),
        None => raw.split(':').next().unwrap_or_default(),
    };
    host.to_lowercase()
}

/// Middleware running [`HostGuard::admit`] ahead of the handlers.
pub async fn host_guard_middleware(
    State(guard): State<Arc<HostGuard>>,
    request: Request,
    next: Next,
) -> Response {
    match guard.admit(request.headers(), request.uri()) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
