//! Browser debug sink.
//!
//! Mounted under `/__debug` only in debug-like mode. Front-end code posts
//! diagnostic payloads here; they are kept in a bounded in-memory log.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ConfigSnapshot;
use crate::http::handlers::epoch_now;
use crate::http::response::AppError;
use crate::http::server::AppState;
use crate::params::QueryParams;
use crate::security::limits::parse_json_or_empty;

pub const DEBUG_TOKEN_HEADER: &str = "x-debug-token";
pub const MIN_LOG_CAPACITY: usize = 100;
pub const MAX_LOG_CAPACITY: usize = 5000;

#[derive(Debug, Clone, Serialize)]
pub struct DebugEntry {
    pub ts: f64,
    pub ua: Option<String>,
    pub ip: Option<String>,
    pub data: Value,
}

/// Fixed-capacity log; the oldest entry is evicted first.
#[derive(Debug)]
pub struct DebugLog {
    entries: Mutex<VecDeque<DebugEntry>>,
    capacity: usize,
}

impl DebugLog {
    pub fn new(requested: usize) -> Self {
        let capacity = requested.clamp(MIN_LOG_CAPACITY, MAX_LOG_CAPACITY);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append and return the new length.
    pub fn push(&self, entry: DebugEntry) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

/// Token check for every debug route.
///
/// With a token configured the caller must present it; without one,
/// only explicit debug mode opens the sink.
pub fn authorized(snapshot: &ConfigSnapshot, headers: &HeaderMap, params: &QueryParams) -> bool {
    match &snapshot.debug_token {
        Some(expected) => {
            let presented = headers
                .get(DEBUG_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .or_else(|| params.get("token"));
            presented == Some(expected.as_str())
        }
        None => snapshot.debug,
    }
}

fn guard(state: &AppState, headers: &HeaderMap, params: &QueryParams) -> Result<(), AppError> {
    if authorized(&state.snapshot, headers, params) {
        Ok(())
    } else {
        tracing::warn!("Debug sink access denied");
        Err(AppError::Forbidden)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/__debug", get(overview))
        .route("/__debug/", get(overview))
        .route("/__debug/ping", get(ping))
        .route("/__debug/report", post(report))
        .route("/__debug/logs", get(logs))
}

async fn overview(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: QueryParams,
) -> Result<Json<Value>, AppError> {
    guard(&state, &headers, &params)?;
    Ok(Json(json!({
        "service": "browser debug sink",
        "endpoints": ["/__debug/ping", "/__debug/report", "/__debug/logs"],
        "capacity": state.debug_log.capacity(),
        "stored": state.debug_log.len(),
    })))
}

async fn ping(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: QueryParams,
) -> Result<Json<Value>, AppError> {
    guard(&state, &headers, &params)?;
    Ok(Json(json!({ "ok": true, "ts": epoch_now() })))
}

async fn report(
    State(state): State<AppState>,
    params: QueryParams,
    request: Request,
) -> Result<Json<Value>, AppError> {
    let (parts, body) = request.into_parts();
    guard(&state, &parts.headers, &params)?;

    let bytes = state.body_guard.read(&parts.headers, body).await?;
    let data = parse_json_or_empty(&bytes);

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let ip = header("x-forwarded-for").or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });

    let size = state.debug_log.push(DebugEntry {
        ts: epoch_now(),
        ua: header("user-agent"),
        ip,
        data,
    });
    tracing::debug!(size, "Stored browser debug report");

    Ok(Json(json!({ "stored": true, "size": size })))
}

async fn logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: QueryParams,
) -> Result<Json<Value>, AppError> {
    guard(&state, &headers, &params)?;
    Ok(Json(json!({ "logs": state.debug_log.entries() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn entry(n: u64) -> DebugEntry {
        DebugEntry {
            ts: n as f64,
            ua: None,
            ip: None,
            data: json!({ "n": n }),
        }
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(DebugLog::new(0).capacity(), MIN_LOG_CAPACITY);
        assert_eq!(DebugLog::new(1_000_000).capacity(), MAX_LOG_CAPACITY);
        assert_eq!(DebugLog::new(500).capacity(), 500);
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let log = DebugLog::new(MIN_LOG_CAPACITY);
        for n in 0..=MIN_LOG_CAPACITY as u64 {
            log.push(entry(n));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), MIN_LOG_CAPACITY);
        assert_eq!(entries[0].data["n"], 1);
    }

    #[test]
    fn test_authorization() {
        let params = QueryParams::from_query(Some("token=s3cret"));
        let empty = QueryParams::default();

        let with_token = ConfigSnapshot {
            debug_like: true,
            debug_token: Some("s3cret".into()),
            ..Default::default()
        };
        assert!(authorized(&with_token, &HeaderMap::new(), &params));
        assert!(!authorized(&with_token, &HeaderMap::new(), &empty));

        let mut headers = HeaderMap::new();
        headers.insert(DEBUG_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(authorized(&with_token, &headers, &empty));

        let browser_only = ConfigSnapshot {
            debug_like: true,
            ..Default::default()
        };
        assert!(!authorized(&browser_only, &HeaderMap::new(), &empty));

        let debug = ConfigSnapshot {
            debug: true,
            debug_like: true,
            ..Default::default()
        };
        assert!(authorized(&debug, &HeaderMap::new(), &empty));
    }
}
