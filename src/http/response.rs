//! Error responses.
//!
//! # Responsibilities
//! - Map boundary and handler failures to HTTP status codes
//! - Give every error under the API namespace a JSON body carrying the
//!   request ID
//! - Convert handler panics into plain 500 responses
//!
//! # Design Decisions
//! - Error bodies never carry internal details (paths, messages)
//! - Non-API errors stay plain text

use std::any::Any;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::security::headers::API_PREFIX;
use crate::security::limits::BodyGuardError;

/// Failures surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("host not allowed: {0}")]
    HostNotAllowed(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::HostNotAllowed(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::HostNotAllowed(_) => "host_not_allowed",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::BadRequest(_) => "bad_request",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::RateLimited => "rate_limited",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<BodyGuardError> for AppError {
    fn from(err: BodyGuardError) -> Self {
        match err {
            BodyGuardError::TooLarge { limit } => AppError::PayloadTooLarge { limit },
            BodyGuardError::Read(msg) => AppError::BadRequest(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        metrics::record_rejection(self.kind());

        match self {
            AppError::Forbidden => status.into_response(),
            _ => (status, status.canonical_reason().unwrap_or_default()).into_response(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: &'static str,
    status: u16,
    request_id: String,
}

/// Reshape error responses under [`API_PREFIX`] into
/// `{"error", "status", "request_id"}` JSON.
pub async fn api_error_middleware(request: Request, next: Next) -> Response {
    let is_api = request.uri().path().starts_with(API_PREFIX);
    let request_id = request.request_id_str().to_string();

    let response = next.run(request).await;
    let status = response.status();

    if !is_api || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    if is_json(response.headers()) {
        return response;
    }

    let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
        "internal_error"
    } else {
        status.canonical_reason().unwrap_or("error")
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);

    let body = ApiErrorBody {
        error,
        status: status.as_u16(),
        request_id,
    };
    (parts, Json(body)).into_response()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Panic handler for `CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Unhandled error in handler");
    AppError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::HostNotAllowed("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_body_guard_conversion() {
        let err: AppError = BodyGuardError::TooLarge { limit: 1024 }.into();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 1024 }));
    }

    #[test]
    fn test_panic_response_hides_detail() {
        let response = handle_panic(Box::new("secret path /srv/data"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
