//! Request body size enforcement.
//!
//! # Responsibilities
//! - Re-check body size on endpoints that accept one, even when the outer
//!   `RequestBodyLimitLayer` is in place
//! - Reject on the declared Content-Length before reading anything
//! - Stop reading as soon as the cap is crossed
//! - Parse JSON leniently once the size check has passed
//!
//! # Design Decisions
//! - Some clients stream without Content-Length, so the cap is enforced on
//!   the bytes actually read as well
//! - Malformed payloads degrade to `{}` instead of failing the request

use axum::{
    body::Body,
    http::{header, HeaderMap},
};
use futures_util::StreamExt;
use http_body_util::LengthLimitError;
use serde_json::Value;

use crate::config::ConfigSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum BodyGuardError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(String),
}

/// Size cap for request bodies. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodySizeGuard {
    max: Option<usize>,
}

impl BodySizeGuard {
    pub fn new(max: Option<usize>) -> Self {
        Self { max }
    }

    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self::new(snapshot.max_content_length)
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Reject on a declared Content-Length above the cap.
    pub fn check_declared(&self, headers: &HeaderMap) -> Result<(), BodyGuardError> {
        let Some(limit) = self.max else {
            return Ok(());
        };
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        match declared {
            Some(len) if len > limit as u64 => Err(BodyGuardError::TooLarge { limit }),
            _ => Ok(()),
        }
    }

    /// Read the whole body, failing once more than the cap has arrived.
    pub async fn read(&self, headers: &HeaderMap, body: Body) -> Result<Vec<u8>, BodyGuardError> {
        self.check_declared(headers)?;

        let mut stream = body.into_data_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            if let Some(limit) = self.max {
                if buf.len() + chunk.len() > limit {
                    return Err(BodyGuardError::TooLarge { limit });
                }
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }

    /// An outer `RequestBodyLimitLayer` surfaces overflow as a body error;
    /// report it as too large rather than as a broken read.
    fn classify(&self, err: axum::Error) -> BodyGuardError {
        let inner = err.into_inner();
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&*inner);
        while let Some(e) = source {
            if e.is::<LengthLimitError>() {
                return BodyGuardError::TooLarge {
                    limit: self.max.unwrap_or_default(),
                };
            }
            source = e.source();
        }
        BodyGuardError::Read(inner.to_string())
    }
}

/// Parse a JSON payload; anything unparsable or empty-ish becomes `{}`.
pub fn parse_json_or_empty(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) if !is_falsy(&value) => value,
        _ => Value::Object(Default::default()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
