//! Configuration errors

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Why a configuration could not be loaded or accepted
#[derive(Debug)]
pub enum ConfigError {
    /// An explicitly named config file does not exist
    FileNotFound(PathBuf),

    /// The config file exists but could not be read
    FileReadError(PathBuf, String),

    /// The config file is not a valid JSON object of known keys
    ParseError(String),

    /// A key holds a value the proxy cannot run with
    InvalidValue(&'static str, String),

    /// A key without default was not set by any layer
    MissingRequiredValue(&'static str),

    /// Keys that are only meaningful together are inconsistent
    InvalidCombination(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "config file {} does not exist", path.display())
            }
            ConfigError::FileReadError(path, err) => {
                write!(f, "cannot read config file {}: {}", path.display(), err)
            }
            ConfigError::ParseError(msg) => write!(f, "malformed config: {}", msg),
            ConfigError::InvalidValue(key, reason) => write!(f, "bad {}: {}", key, reason),
            ConfigError::MissingRequiredValue(key) => write!(
                f,
                "{} is not set, use {}{} or --{}",
                key,
                super::defaults::ENV_PREFIX,
                key.to_uppercase(),
                key.replace('_', "-")
            ),
            ConfigError::InvalidCombination(msg) => f.write_str(msg),
        }
    }
}

impl Error for ConfigError {}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for crate::common::ProxyError {
    fn from(err: ConfigError) -> Self {
        crate::common::ProxyError::Config(err.to_string())
    }
}
