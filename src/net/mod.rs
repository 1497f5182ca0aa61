//! Network layer.
//!
//! Plain TCP is served by `axum::serve`; `tls.rs` loads certificates for
//! the optional rustls listener. A TLS listener marks every request as
//! secure for the header policy.

pub mod tls;
