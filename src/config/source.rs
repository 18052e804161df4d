//! Configuration sources
//!
//! This module defines traits and implementations for loading configuration
//! from different sources.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, warn};

use crate::config::cli::CliArgs;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, ProxyConfig, ValueSource};

/// Configuration source trait
pub trait ConfigSource {
    /// Load configuration from this source
    fn load(&self) -> Result<ProxyConfig>;

    /// Get the source type
    fn source_type(&self) -> ValueSource;
}

/// Default configuration source
pub struct DefaultSource;

impl ConfigSource for DefaultSource {
    fn load(&self) -> Result<ProxyConfig> {
        debug!("Loading default configuration");
        Ok(ProxyConfig::default())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Default
    }
}

/// JSON file configuration source
pub struct FileSource {
    pub path: PathBuf,
    pub required: bool,
}

impl FileSource {
    /// A file that may be missing
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: false,
        }
    }

    /// A file that must exist
    pub fn required<P: AsRef<Path>>(path: P) -> Self {
        Self {
            required: true,
            ..Self::new(path)
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ProxyConfig> {
        debug!("Loading configuration from file: {}", self.path.display());

        if !self.path.exists() {
            if self.required {
                return Err(ConfigError::FileNotFound(self.path.clone()));
            }
            warn!("Configuration file not found: {}", self.path.display());
            warn!("Using defaults, environment and command line only");
            return Ok(ProxyConfig::empty());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileReadError(self.path.clone(), e.to_string()))?;

        let values: ConfigValues = serde_json::from_str(&contents).map_err(|e| {
            let err_msg = format!("Error parsing {}: {}", self.path.display(), e);
            warn!("{}", err_msg);
            ConfigError::ParseError(err_msg)
        })?;

        let mut config = ProxyConfig::from_values(values, self.source_type());
        config.config_file = Some(self.path.clone());
        Ok(config)
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::File
    }
}

/// Environment variable configuration source
pub struct EnvSource {
    pub prefix: String,
}

impl EnvSource {
    /// Create a new environment source
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        let key = format!("{}{}", self.prefix, name.to_uppercase());
        let value = env::var(&key).ok()?;
        debug!("Found environment variable {}={}", key, value);
        Some(value)
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        let value = self.var(name)?;
        match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!("Invalid {} in environment: {}", name, value);
                None
            }
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        let value = self.var(name)?;
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                warn!("Invalid {} in environment: {}", name, value);
                None
            }
        }
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ProxyConfig> {
        debug!("Loading configuration from environment variables with prefix: {}", self.prefix);

        let values = ConfigValues {
            listen_ip: self.var("listen_ip"),
            listen_port: self.parsed("listen_port"),
            forward_ip: self.var("forward_ip"),
            forward_port: self.parsed("forward_port"),
            forward_timeout: self.parsed("forward_timeout"),
            portal: self.var("portal"),
            dns_retries: self.parsed("dns_retries"),
            buffer_size: self.parsed("buffer_size"),
            log_level: self.var("log_level"),
            log_hex: self.flag("log_hex"),
            send_json: self.flag("send_json"),
            base_topic: self.var("base_topic"),
        };

        Ok(ProxyConfig::from_values(values, self.source_type()))
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Environment
    }
}

/// Command line argument configuration source
pub struct CliSource {
    pub args: CliArgs,
}

impl CliSource {
    /// Create a new command line source
    pub fn new(args: CliArgs) -> Self {
        Self { args }
    }
}

impl ConfigSource for CliSource {
    fn load(&self) -> Result<ProxyConfig> {
        debug!("Loading configuration from command line arguments");
        Ok(ProxyConfig::from_values(self.args.values(), self.source_type()))
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::CommandLine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen_port": 10013, "forward_ip": "47.91.242.120", "send_json": true}}"#
        )
        .unwrap();

        let config = FileSource::new(file.path()).load().unwrap();
        assert_eq!(config.listen_port(), 10013);
        assert_eq!(config.forward_ip(), Some("47.91.242.120"));
        assert!(config.send_json());
        assert_eq!(config.source("listen_port"), "file");
        assert_eq!(config.config_file(), Some(file.path()));
    }

    #[test]
    fn test_missing_file() {
        let config = FileSource::new("/nonexistent/enverproxy.json").load().unwrap();
        assert!(config.present_fields().is_empty());

        let err = FileSource::required("/nonexistent/enverproxy.json").load();
        assert!(matches!(err, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "listen_port = 10013").unwrap();

        assert!(matches!(FileSource::new(file.path()).load(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    #[serial]
    fn test_env_source() {
        env::set_var("ENVERPROXY_TEST_LISTEN_PORT", "10013");
        env::set_var("ENVERPROXY_TEST_LOG_HEX", "yes");
        env::set_var("ENVERPROXY_TEST_BUFFER_SIZE", "big");

        let config = EnvSource::new("ENVERPROXY_TEST_").load().unwrap();

        env::remove_var("ENVERPROXY_TEST_LISTEN_PORT");
        env::remove_var("ENVERPROXY_TEST_LOG_HEX");
        env::remove_var("ENVERPROXY_TEST_BUFFER_SIZE");

        assert_eq!(config.values.listen_port, Some(10013));
        assert_eq!(config.values.log_hex, Some(true));
        assert_eq!(config.values.buffer_size, None);
        assert_eq!(config.source("listen_port"), "environment");
    }

    #[test]
    fn test_cli_source() {
        let args = CliArgs {
            listen_port: Some(10013),
            send_json: true,
            ..Default::default()
        };

        let config = CliSource::new(args).load().unwrap();
        assert_eq!(config.values.listen_port, Some(10013));
        assert_eq!(config.values.send_json, Some(true));
        assert_eq!(config.values.log_hex, None);
        assert_eq!(config.source("send_json"), "command line");
    }
}
