//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware order)
//!     → request.rs (request ID)
//!     → security::* (host guard, limits, rate limiting)
//!     → handlers.rs / debug.rs (pages, JSON API, debug sink)
//!     → response.rs (error mapping, API error bodies)
//!     → security::headers (response hardening)
//!     → Send to client
//! ```

pub mod debug;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::AppError;
pub use server::{AppState, HttpServer};
