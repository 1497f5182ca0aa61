//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and
//! addresses. Every problem is reported, not just the first one.

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Upper bound for `nodes.max_page_size`.
pub const PAGE_SIZE_CEILING: i64 = 10_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("nodes.default_page_size ({default}) exceeds nodes.max_page_size ({max})")]
    PageSizeOrder { default: i64, max: i64 },

    #[error("{field}: must not exceed {max}")]
    TooLarge { field: &'static str, max: i64 },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.cert_path" });
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.key_path" });
        }
    }

    if config.nodes.default_page_size < 1 {
        errors.push(ValidationError::NotPositive { field: "nodes.default_page_size" });
    }
    if config.nodes.max_page_size < 1 {
        errors.push(ValidationError::NotPositive { field: "nodes.max_page_size" });
    }
    if config.nodes.max_page_size > PAGE_SIZE_CEILING {
        errors.push(ValidationError::TooLarge {
            field: "nodes.max_page_size",
            max: PAGE_SIZE_CEILING,
        });
    }
    if config.nodes.default_page_size > config.nodes.max_page_size {
        errors.push(ValidationError::PageSizeOrder {
            default: config.nodes.default_page_size,
            max: config.nodes.max_page_size,
        });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_minute == 0 {
            errors.push(ValidationError::NotPositive { field: "rate_limit.requests_per_minute" });
        }
        if config.rate_limit.burst == 0 {
            errors.push(ValidationError::NotPositive { field: "rate_limit.burst" });
        }
        if config.rate_limit.cleanup_interval_secs == 0 {
            errors.push(ValidationError::NotPositive { field: "rate_limit.cleanup_interval_secs" });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "timeouts.request_secs" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.nodes.max_page_size = 0;
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: "not-an-address".into(),
        }));
        assert!(errors.contains(&ValidationError::NotPositive { field: "nodes.max_page_size" }));
        assert!(errors.contains(&ValidationError::NotPositive { field: "timeouts.request_secs" }));
        // default (100) > max (0)
        assert!(errors.iter().any(|e| matches!(e, ValidationError::PageSizeOrder { .. })));
    }

    #[test]
    fn test_max_page_size_ceiling() {
        let mut config = AppConfig::default();
        config.nodes.max_page_size = PAGE_SIZE_CEILING;
        assert!(validate_config(&config).is_ok());

        config.nodes.max_page_size = i64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::TooLarge {
                field: "nodes.max_page_size",
                max: PAGE_SIZE_CEILING,
            }]
        );
    }

    #[test]
    fn test_rate_limit_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_tls_paths_required() {
        let mut config = AppConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: " ".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Empty { field: "listener.tls.key_path" }]);
    }
}
