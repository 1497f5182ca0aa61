//! Mesh Health Web UI server library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod nodes;
pub mod observability;
pub mod params;
pub mod security;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
