//! Request identification.
//!
//! # Responsibilities
//! - Generate a fresh request ID for every inbound request
//! - Make it available to handlers, logs and the response header policy
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Client-supplied X-Request-ID values are not trusted or reused

use std::fmt;
use std::task::{Context, Poll};

use axum::http::{request::Parts, HeaderName, Request};
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the request ID on responses.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque per-request correlation token (UUID v4, simple hex form).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access to the request ID stored in request extensions.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;

    /// The ID as a string, empty when none was assigned.
    fn request_id_str(&self) -> &str {
        self.request_id().map(RequestId::as_str).unwrap_or_default()
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get()
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get()
    }
}

/// Layer assigning a [`RequestId`] to every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        request.extensions_mut().insert(RequestId::new());
        self.inner.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[test]
    fn request_ids_are_unique_hex() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn layer_assigns_fresh_id() {
        let service = RequestIdLayer.layer(tower::service_fn(|req: Request<Body>| async move {
            Ok::<_, Infallible>(req.request_id_str().to_string())
        }));

        let request = Request::builder()
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let id = service.oneshot(request).await.unwrap();
        assert_eq!(id.len(), 32);
        assert_ne!(id, "client-chosen");
    }

    #[test]
    fn missing_id_reads_as_empty() {
        let request = Request::new(());
        assert!(request.request_id().is_none());
        assert_eq!(request.request_id_str(), "");
    }
}
