//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the web UI.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cap on request bodies (1 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 1024 * 1024;

/// Root configuration for the web UI.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Request boundary settings (hosts, proxies, body size, debug flags).
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Node listing data source and page sizes.
    pub nodes: NodesConfig,

    /// Browser debug sink settings.
    pub debug: DebugConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5008").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5008".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Request boundary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Development mode.
    pub debug: bool,

    /// Expose the browser debug sink without full debug mode.
    pub enable_browser_debug: bool,

    /// Comma-separated Host allowlist. Empty disables the check.
    pub allowed_hosts: String,

    /// Trust X-Forwarded-Host / X-Forwarded-Proto from a fronting proxy.
    pub trust_proxy_headers: bool,

    /// Maximum request body size in bytes. 0 disables the limit.
    pub max_content_length: u64,

    /// Shared secret for the debug sink.
    pub debug_token: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            enable_browser_debug: false,
            allowed_hosts: String::new(),
            trust_proxy_headers: false,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            debug_token: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. Ignored while debug-like.
    pub enabled: bool,

    /// Sustained requests per minute per client IP.
    pub requests_per_minute: u32,

    /// Burst capacity.
    pub burst: u32,

    /// How often idle buckets are pruned.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: 300,
            burst: 60,
            cleanup_interval_secs: 60,
        }
    }
}

/// Node listing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodesConfig {
    /// JSON file with the node list. Missing file means an empty directory.
    pub data_file: Option<PathBuf>,

    /// Page size when the client does not ask for one.
    pub default_page_size: i64,

    /// Upper bound for any requested page size.
    pub max_page_size: i64,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            default_page_size: 100,
            max_page_size: 200,
        }
    }
}

/// Browser debug sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Ring buffer capacity (clamped to 100..=5000).
    pub log_buffer_size: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { log_buffer_size: 500 }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Immutable view of the settings the request boundary consults.
///
/// Built once at startup and shared behind an `Arc`; components receive it
/// (or the pieces they need) through their constructors.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub debug: bool,
    pub debug_like: bool,
    pub allowed_hosts: HashSet<String>,
    pub trust_proxy_headers: bool,
    pub max_content_length: Option<usize>,
    pub debug_token: Option<String>,
    pub tls_listener: bool,
}

impl AppConfig {
    /// Explicit debug mode or the browser debug flag.
    pub fn debug_like(&self) -> bool {
        self.security.debug || self.security.enable_browser_debug
    }

    /// Freeze the boundary-relevant settings.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let max_content_length = match self.security.max_content_length {
            0 => None,
            n => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };

        ConfigSnapshot {
            debug: self.security.debug,
            debug_like: self.debug_like(),
            allowed_hosts: parse_host_list(&self.security.allowed_hosts),
            trust_proxy_headers: self.security.trust_proxy_headers,
            max_content_length,
            debug_token: self
                .security
                .debug_token
                .clone()
                .filter(|t| !t.is_empty()),
            tls_listener: self.listener.tls.is_some(),
        }
    }
}

/// Split a comma-separated host list into a lower-cased set.
pub fn parse_host_list(csv: &str) -> HashSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_list_parsing() {
        let hosts = parse_host_list(" Example.com, ,localhost ,");
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains("example.com"));
        assert!(hosts.contains("localhost"));
        assert!(parse_host_list("").is_empty());
    }

    #[test]
    fn test_snapshot_debug_like() {
        let mut config = AppConfig::default();
        assert!(!config.snapshot().debug_like);

        config.security.enable_browser_debug = true;
        let snapshot = config.snapshot();
        assert!(snapshot.debug_like);
        assert!(!snapshot.debug);
    }

    #[test]
    fn test_snapshot_zero_length_disables_limit() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.snapshot().max_content_length,
            Some(DEFAULT_MAX_CONTENT_LENGTH as usize)
        );

        config.security.max_content_length = 0;
        assert_eq!(config.snapshot().max_content_length, None);
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let mut config = AppConfig::default();
        config.security.debug_token = Some(String::new());
        assert!(config.snapshot().debug_token.is_none());
    }

    #[test]
    fn test_toml_partial_config() {
        let config: AppConfig = toml::from_str(
            r#"
            [security]
            allowed_hosts = "mesh.example.org"
            max_content_length = 2048

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.security.max_content_length, 2048);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.nodes.max_page_size, 200);
        assert_eq!(config.listener.bind_address, "127.0.0.1:5008");
    }
}
