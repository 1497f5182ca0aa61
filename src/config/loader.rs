//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{AppConfig, DEFAULT_MAX_CONTENT_LENGTH};
use crate::config::validation::{validate_config, ValidationError};
use crate::params::is_truthy;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "MESH_HEALTH_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `MESH_HEALTH_*` variables onto the configuration.
///
/// `lookup` receives the full variable name.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = var("DEBUG") {
        config.security.debug = is_truthy(&v);
    }
    if let Some(v) = var("ENABLE_BROWSER_DEBUG") {
        config.security.enable_browser_debug = is_truthy(&v);
    }
    if let Some(v) = var("ALLOWED_HOSTS") {
        config.security.allowed_hosts = v;
    }
    if let Some(v) = var("TRUST_PROXY_HEADERS") {
        config.security.trust_proxy_headers = is_truthy(&v);
    }
    if let Some(v) = var("MAX_CONTENT_LENGTH") {
        config.security.max_content_length = v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %v, "Invalid max content length, using default");
            DEFAULT_MAX_CONTENT_LENGTH
        });
    }
    if let Some(v) = var("DEBUG_TOKEN") {
        config.security.debug_token = Some(v);
    }
    if let Some(v) = var("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = var("DATA_FILE") {
        config.nodes.data_file = Some(PathBuf::from(v));
    }
    if let Some(v) = var("LOG_LEVEL") {
        config.observability.log_level = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("DEBUG", "yes"),
                ("ALLOWED_HOSTS", "mesh.local,example.com"),
                ("TRUST_PROXY_HEADERS", "1"),
                ("MAX_CONTENT_LENGTH", "1024"),
                ("DATA_FILE", "/srv/nodes.json"),
            ]),
        );

        assert!(config.security.debug);
        assert!(config.security.trust_proxy_headers);
        assert_eq!(config.security.allowed_hosts, "mesh.local,example.com");
        assert_eq!(config.security.max_content_length, 1024);
        assert_eq!(config.nodes.data_file, Some(PathBuf::from("/srv/nodes.json")));
    }

    #[test]
    fn test_bad_max_content_length_falls_back() {
        let mut config = AppConfig::default();
        config.security.max_content_length = 7;
        apply_env_overrides(&mut config, env(&[("MAX_CONTENT_LENGTH", "lots")]));
        assert_eq!(config.security.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
    }

    #[test]
    fn test_false_like_values_disable_flags() {
        let mut config = AppConfig::default();
        config.security.debug = true;
        apply_env_overrides(&mut config, env(&[("DEBUG", "off")]));
        assert!(!config.security.debug);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
