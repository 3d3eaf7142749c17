//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parseable)
//! - Check the advertised authority is usable in rewritten URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "listener.bind_address").
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".to_string(),
            message: format!("not a valid socket address: {}", config.listener.bind_address),
        });
    }

    if config.listener.advertised_authority.is_empty() {
        errors.push(ValidationError {
            field: "listener.advertised_authority".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.upstream.connect_secs == 0 {
        errors.push(ValidationError {
            field: "upstream.connect_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.upstream.request_secs == 0 {
        errors.push(ValidationError {
            field: "upstream.request_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.static_files.root.is_empty() {
        errors.push(ValidationError {
            field: "static_files.root".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.limits.max_html_buffer == 0 {
        errors.push(ValidationError {
            field: "limits.max_html_buffer".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address".to_string(),
            message: format!(
                "not a valid socket address: {}",
                config.observability.metrics_address
            ),
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

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.upstream.request_secs = 0;
        config.static_files.root = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
        assert!(errors.iter().any(|e| e.field == "upstream.request_secs"));
        assert!(errors.iter().any(|e| e.field == "static_files.root"));
    }
}
