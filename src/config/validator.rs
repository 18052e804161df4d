//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;

use crate::common::log::parse_level;
use crate::config::error::{ConfigError, Result};
use crate::config::types::ProxyConfig;

/// Validate the configuration
pub fn validate_config(config: &ProxyConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_general_settings(config)?;

    for warning in config.check_warnings() {
        warn!("{}", warning);
    }

    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &ProxyConfig) -> Result<()> {
    match config.values.listen_port {
        None => return Err(ConfigError::MissingRequiredValue("listen_port")),
        Some(0) => return Err(ConfigError::InvalidValue("listen_port", "must not be 0".into())),
        Some(_) => {}
    }

    if config.values.forward_port == Some(0) {
        return Err(ConfigError::InvalidValue("forward_port", "must not be 0".to_string()));
    }

    if config.forward_ip().is_none() && config.portal().is_none() {
        return Err(ConfigError::InvalidCombination(
            "Either forward_ip or portal must be set".to_string(),
        ));
    }

    // Resolved later, but an unparsable listen ip is known now
    config
        .listen_addr()
        .map_err(|e| ConfigError::InvalidValue("listen_ip", e.to_string()))?;

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &ProxyConfig) -> Result<()> {
    if config.buffer_size() == 0 {
        return Err(ConfigError::InvalidValue("buffer_size", "must be greater than 0".to_string()));
    }

    if config.forward_timeout().is_zero() {
        return Err(ConfigError::InvalidValue(
            "forward_timeout",
            "must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Configuration validator trait
pub trait ConfigValidator {
    /// Check configuration for warnings
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for ProxyConfig {
    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if parse_level(self.log_level()).is_none() {
            warnings.push(format!(
                "Invalid log level '{}', using default 'info'",
                self.log_level()
            ));
        }

        if self.portal().is_some() && self.dns_retries() == 0 {
            warnings.push("dns_retries is 0, the portal will never be looked up".to_string());
        }

        if self.portal().is_some() && self.forward_ip().is_none() {
            warnings.push(
                "No forward_ip configured, startup fails if the portal cannot be resolved"
                    .to_string(),
            );
        }

        warnings
    }
}
