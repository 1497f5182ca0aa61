//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse, MESH_HEALTH_* env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → ConfigSnapshot (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, ConfigSnapshot, ListenerConfig, NodesConfig, RateLimitConfig};
