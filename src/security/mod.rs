//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host_guard.rs (Host allowlist, 400 on mismatch)
//!     → rate_limit.rs (per-client token buckets)
//!     → limits.rs (body size, on endpoints that read a body)
//!     → handler
//! Outgoing response:
//!     → headers.rs (security headers, set-if-absent)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: body size is checked by the outer layer and again
//!   by the endpoint
//! - Admission failures short-circuit; header failures only skip a header
//! - No trust in forwarded headers unless configured

pub mod headers;
pub mod host_guard;
pub mod limits;
pub mod rate_limit;

pub use headers::{RequestView, SecurityHeaderPolicy};
pub use host_guard::HostGuard;
pub use limits::BodySizeGuard;
pub use rate_limit::RateLimiterState;
