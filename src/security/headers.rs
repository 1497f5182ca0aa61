//! Security response headers.
//!
//! # Responsibilities
//! - Attach the baseline browser hardening headers to every response
//! - Pick one of two Content-Security-Policy profiles (production / debug-like)
//! - Advertise HSTS only over a secure transport
//! - Mark API responses as non-cacheable
//!
//! # Design Decisions
//! - Set-if-absent: a header already present on the response is never
//!   replaced, so handlers can override any of them
//! - A header whose value cannot be produced is skipped; the others still
//!   go out
//! - Runs outside the guards, error shaping and panic catching, so
//!   rejections, 404s and caught panics are covered too

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::Scheme,
        Uri,
    },
    middleware::Next,
    response::Response,
};

use crate::config::ConfigSnapshot;
use crate::http::request::{RequestId, RequestIdExt, X_REQUEST_ID};

/// Paths under this prefix are JSON API endpoints.
pub const API_PREFIX: &str = "/api/";

/// CSP for production: no inline code, no plaintext connections.
pub const CSP_PRODUCTION: &str = "default-src 'self'; \
img-src 'self' data: blob: https:; \
style-src 'self' https:; \
script-src 'self' https:; \
font-src 'self' data: https:; \
connect-src 'self' https: wss:; \
frame-ancestors 'none';";

/// CSP for debug-like mode: inline code, eval and plain http for local tooling.
pub const CSP_DEBUG: &str = "default-src 'self'; \
img-src 'self' data: blob: https:; \
style-src 'self' 'unsafe-inline' https:; \
script-src 'self' 'unsafe-inline' 'unsafe-eval' https:; \
font-src 'self' data: https:; \
connect-src 'self' https: http: wss:; \
frame-ancestors 'none';";

pub const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

const X_FRAME_OPTIONS: HeaderName = HeaderName::from_static("x-frame-options");
const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");
const CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");
const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// What the policy needs to know about the request, captured before the
/// request is handed to the inner service.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    pub path: String,
    pub secure: bool,
    pub request_id: Option<RequestId>,
}

/// Computes and attaches the response security headers.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaderPolicy {
    debug_like: bool,
    tls_listener: bool,
    trust_proxy_headers: bool,
}

impl SecurityHeaderPolicy {
    pub fn new(snapshot: &ConfigSnapshot) -> Self {
        Self {
            debug_like: snapshot.debug_like,
            tls_listener: snapshot.tls_listener,
            trust_proxy_headers: snapshot.trust_proxy_headers,
        }
    }

    /// The CSP profile in effect.
    pub fn csp(&self) -> &'static str {
        if self.debug_like {
            CSP_DEBUG
        } else {
            CSP_PRODUCTION
        }
    }

    /// Whether the request reached us over TLS (directly or, when proxy
    /// headers are trusted, through a TLS-terminating proxy).
    pub fn is_secure(&self, headers: &HeaderMap, uri: &Uri) -> bool {
        if self.tls_listener || uri.scheme() == Some(&Scheme::HTTPS) {
            return true;
        }
        self.trust_proxy_headers
            && headers
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.rsplit(',').next())
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }

    pub fn request_view<B>(&self, request: &axum::http::Request<B>) -> RequestView {
        RequestView {
            path: request.uri().path().to_string(),
            secure: self.is_secure(request.headers(), request.uri()),
            request_id: request.request_id().cloned(),
        }
    }

    /// Attach every header that is not already present.
    pub fn apply(&self, view: &RequestView, headers: &mut HeaderMap) {
        set_if_absent(headers, X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        set_if_absent(
            headers,
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        set_if_absent(
            headers,
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        );
        set_if_absent(
            headers,
            PERMISSIONS_POLICY,
            HeaderValue::from_static("geolocation=()"),
        );

        match view.request_id.as_ref().map(|id| HeaderValue::from_str(id.as_str())) {
            Some(Ok(value)) => set_if_absent(headers, X_REQUEST_ID, value),
            Some(Err(e)) => tracing::debug!(error = %e, "Skipping unusable request id header"),
            None => tracing::debug!(path = %view.path, "No request id on request"),
        }

        set_if_absent(
            headers,
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(self.csp()),
        );
        set_if_absent(
            headers,
            CROSS_ORIGIN_OPENER_POLICY,
            HeaderValue::from_static("same-origin"),
        );
        set_if_absent(
            headers,
            CROSS_ORIGIN_RESOURCE_POLICY,
            HeaderValue::from_static("same-site"),
        );

        if view.secure {
            set_if_absent(
                headers,
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            );
        }

        if view.path.starts_with(API_PREFIX) {
            set_if_absent(headers, header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            set_if_absent(headers, header::PRAGMA, HeaderValue::from_static("no-cache"));
        }
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}

/// Middleware applying [`SecurityHeaderPolicy`] to every response.
pub async fn security_headers_middleware(
    State(policy): State<Arc<SecurityHeaderPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let view = policy.request_view(&request);
    let mut response = next.run(request).await;
    policy.apply(&view, response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(debug_like: bool) -> SecurityHeaderPolicy {
        SecurityHeaderPolicy {
            debug_like,
            ..Default::default()
        }
    }

    fn view(path: &str, secure: bool) -> RequestView {
        RequestView {
            path: path.to_string(),
            secure,
            request_id: Some(RequestId::new()),
        }
    }

    #[test]
    fn test_baseline_headers() {
        let mut headers = HeaderMap::new();
        policy(false).apply(&view("/", false), &mut headers);

        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert_eq!(headers["permissions-policy"], "geolocation=()");
        assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
        assert_eq!(headers["cross-origin-resource-policy"], "same-site");
        assert!(!headers["x-request-id"].is_empty());
        assert!(headers.get("cache-control").is_none());
        assert!(headers.get("strict-transport-security").is_none());
    }

    #[test]
    fn test_csp_profiles() {
        assert_eq!(policy(false).csp(), CSP_PRODUCTION);
        assert_eq!(policy(true).csp(), CSP_DEBUG);

        assert!(CSP_PRODUCTION.contains("script-src 'self' https:;"));
        assert!(CSP_PRODUCTION.contains("style-src 'self' https:;"));
        assert!(CSP_PRODUCTION.contains("connect-src 'self' https: wss:;"));
        assert!(!CSP_PRODUCTION.contains(" http:"));
        assert!(!CSP_PRODUCTION.contains("'unsafe-inline'"));

        assert!(CSP_DEBUG.contains("script-src 'self' 'unsafe-inline' 'unsafe-eval' https:;"));
        assert!(CSP_DEBUG.contains("style-src 'self' 'unsafe-inline' https:;"));
        assert!(CSP_DEBUG.contains("connect-src 'self' https: http: wss:;"));

        for csp in [CSP_PRODUCTION, CSP_DEBUG] {
            assert!(csp.starts_with("default-src 'self'; img-src 'self' data: blob: https:;"));
            assert!(csp.contains("font-src 'self' data: https:;"));
            assert!(csp.ends_with("frame-ancestors 'none';"));
        }
    }

    #[test]
    fn test_hsts_only_when_secure() {
        let mut plain = HeaderMap::new();
        policy(false).apply(&view("/", false), &mut plain);
        assert!(plain.get("strict-transport-security").is_none());

        let mut secure = HeaderMap::new();
        policy(false).apply(&view("/", true), &mut secure);
        assert_eq!(secure["strict-transport-security"], HSTS_VALUE);
    }

    #[test]
    fn test_api_paths_are_not_cached() {
        let mut headers = HeaderMap::new();
        policy(false).apply(&view("/api/nodes/data", false), &mut headers);
        assert_eq!(headers["cache-control"], "no-store");
        assert_eq!(headers["pragma"], "no-cache");

        let mut page = HeaderMap::new();
        policy(false).apply(&view("/apiary", false), &mut page);
        assert!(page.get("cache-control").is_none());
    }

    #[test]
    fn test_existing_headers_are_kept() {
        let mut headers = HeaderMap::new();
        headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
        headers.insert("cache-control", HeaderValue::from_static("max-age=60"));
        policy(false).apply(&view("/api/x", false), &mut headers);

        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(headers["cache-control"], "max-age=60");
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let policy = policy(true);
        let mut headers = HeaderMap::new();
        policy.apply(&view("/api/x", true), &mut headers);
        let first = headers.clone();

        // A second pass with a different request id must not touch anything.
        policy.apply(&view("/api/x", true), &mut headers);
        assert_eq!(headers, first);
        for name in first.keys() {
            assert_eq!(headers.get_all(name).iter().count(), 1, "{name} duplicated");
        }
    }

    #[test]
    fn test_missing_request_id_skips_only_that_header() {
        let mut headers = HeaderMap::new();
        let view = RequestView {
            path: "/".into(),
            secure: false,
            request_id: None,
        };
        policy(false).apply(&view, &mut headers);
        assert!(headers.get("x-request-id").is_none());
        assert!(headers.get("content-security-policy").is_some());
    }

    #[test]
    fn test_secure_detection() {
        let uri: Uri = "/".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http, https"));

        assert!(!policy(false).is_secure(&headers, &uri));

        let trusting = SecurityHeaderPolicy {
            trust_proxy_headers: true,
            ..Default::default()
        };
        assert!(trusting.is_secure(&headers, &uri));
        assert!(!trusting.is_secure(&HeaderMap::new(), &uri));

        let tls = SecurityHeaderPolicy {
            tls_listener: true,
            ..Default::default()
        };
        assert!(tls.is_secure(&HeaderMap::new(), &uri));

        let absolute: Uri = "https://mesh.example.org/".parse().unwrap();
        assert!(policy(false).is_secure(&HeaderMap::new(), &absolute));
    }
}
