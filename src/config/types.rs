//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::common;
use crate::config::defaults::{self, BASE_TOPIC_STR, LISTEN_IP_STR, LOG_LEVEL_STR};
use crate::inspect::PublishSettings;
use crate::proxy::ProxySettings;

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Configuration values
///
/// Every field is optional so that partial sources can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    // --- Network settings ---

    /// Ip to listen on, empty for all interfaces
    #[serde(default)]
    pub listen_ip: Option<String>,

    /// Port the inverter bridge connects to
    #[serde(default)]
    pub listen_port: Option<u16>,

    /// Static portal ip
    #[serde(default)]
    pub forward_ip: Option<String>,

    /// Portal port, same as `listen_port` when absent
    #[serde(default)]
    pub forward_port: Option<u16>,

    /// Forward connect timeout in seconds
    #[serde(default)]
    pub forward_timeout: Option<u64>,

    /// Portal host name, looked up before falling back to `forward_ip`
    #[serde(default)]
    pub portal: Option<String>,

    /// Number of portal lookups
    #[serde(default)]
    pub dns_retries: Option<u32>,

    /// Read buffer size in bytes
    #[serde(default)]
    pub buffer_size: Option<usize>,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Log frame bodies in hex
    #[serde(default)]
    pub log_hex: Option<bool>,

    // --- Publishing ---

    /// Publish one JSON document per device
    #[serde(default)]
    pub send_json: Option<bool>,

    /// Topic prefix
    #[serde(default)]
    pub base_topic: Option<String>,
}

impl ConfigValues {
    /// Names of the fields that hold a value
    pub fn present_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("listen_ip", self.listen_ip.is_some()),
            ("listen_port", self.listen_port.is_some()),
            ("forward_ip", self.forward_ip.is_some()),
            ("forward_port", self.forward_port.is_some()),
            ("forward_timeout", self.forward_timeout.is_some()),
            ("portal", self.portal.is_some()),
            ("dns_retries", self.dns_retries.is_some()),
            ("buffer_size", self.buffer_size.is_some()),
            ("log_level", self.log_level.is_some()),
            ("log_hex", self.log_hex.is_some()),
            ("send_json", self.send_json.is_some()),
            ("base_topic", self.base_topic.is_some()),
        ];

        fields
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect()
    }
}

/// Proxy configuration
///
/// Values merged from every source, together with where each value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Configuration values
    pub values: ConfigValues,

    /// Configuration file path
    pub config_file: Option<PathBuf>,

    /// Source tracking for configuration values
    pub sources: HashMap<String, ValueSource>,
}

impl Deref for ProxyConfig {
    type Target = ConfigValues;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl Serialize for ProxyConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.values.serialize(serializer)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        config.set_default_values();
        config
    }
}

impl ProxyConfig {
    /// A configuration without any value
    pub fn empty() -> Self {
        Self {
            values: ConfigValues::default(),
            config_file: None,
            sources: HashMap::new(),
        }
    }

    /// Wrap values loaded from one source
    pub fn from_values(values: ConfigValues, source: ValueSource) -> Self {
        let sources = values
            .present_fields()
            .into_iter()
            .map(|name| (name.to_string(), source))
            .collect();

        Self {
            values,
            config_file: None,
            sources,
        }
    }

    /// Set default values for all options that have one
    pub fn set_default_values(&mut self) {
        let values = &mut self.values;
        let sources = &mut self.sources;

        macro_rules! default_field {
            ($name:ident, $value:expr) => {
                if values.$name.is_none() {
                    values.$name = Some($value);
                    sources.insert(stringify!($name).to_string(), ValueSource::Default);
                }
            };
        }

        default_field!(listen_ip, LISTEN_IP_STR.to_string());
        default_field!(forward_timeout, defaults::FORWARD_TIMEOUT_SECS);
        default_field!(dns_retries, defaults::DNS_RETRIES);
        default_field!(buffer_size, defaults::BUFFER_SIZE);
        default_field!(log_level, LOG_LEVEL_STR.to_string());
        default_field!(log_hex, false);
        default_field!(send_json, false);
        default_field!(base_topic, BASE_TOPIC_STR.to_string());
    }

    /// Get the source of a configuration value
    pub fn source(&self, name: &str) -> String {
        match self.sources.get(name) {
            Some(source) => source.to_string(),
            None => "unset".to_string(),
        }
    }

    /// Get the listen ip, empty for all interfaces
    pub fn listen_ip(&self) -> &str {
        self.values.listen_ip.as_deref().unwrap_or(LISTEN_IP_STR)
    }

    /// Get the listen port, 0 when unset
    pub fn listen_port(&self) -> u16 {
        self.values.listen_port.unwrap_or(0)
    }

    /// Get the static forward ip
    pub fn forward_ip(&self) -> Option<&str> {
        self.values.forward_ip.as_deref().filter(|ip| !ip.trim().is_empty())
    }

    /// Get the forward port, defaulting to the listen port
    pub fn forward_port(&self) -> u16 {
        self.values.forward_port.unwrap_or_else(|| self.listen_port())
    }

    /// Get the forward connect timeout
    pub fn forward_timeout(&self) -> Duration {
        self.values
            .forward_timeout
            .map(Duration::from_secs)
            .unwrap_or_else(defaults::forward_timeout)
    }

    /// Get the portal host name
    pub fn portal(&self) -> Option<&str> {
        self.values.portal.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Get the number of portal lookups
    pub fn dns_retries(&self) -> u32 {
        self.values.dns_retries.unwrap_or(defaults::DNS_RETRIES)
    }

    /// Get the buffer size
    pub fn buffer_size(&self) -> usize {
        self.values.buffer_size.unwrap_or(defaults::BUFFER_SIZE)
    }

    /// Get the log level
    pub fn log_level(&self) -> &str {
        self.values.log_level.as_deref().unwrap_or(LOG_LEVEL_STR)
    }

    /// Whether frame bodies are logged in hex
    pub fn log_hex(&self) -> bool {
        self.values.log_hex.unwrap_or(false)
    }

    /// Whether records are published as JSON
    pub fn send_json(&self) -> bool {
        self.values.send_json.unwrap_or(false)
    }

    /// Get the topic prefix
    pub fn base_topic(&self) -> &str {
        self.values.base_topic.as_deref().unwrap_or(BASE_TOPIC_STR)
    }

    /// Get the configuration file path
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Address to bind the listener on
    pub fn listen_addr(&self) -> common::Result<SocketAddr> {
        common::listen_addr(self.listen_ip(), self.listen_port())
    }

    /// Look up the portal, falling back to `forward_ip`
    pub async fn resolve_forward(&self) -> common::Result<SocketAddr> {
        common::resolve_forward(
            self.portal(),
            self.forward_ip(),
            self.forward_port(),
            self.dns_retries(),
        )
        .await
    }

    /// Settings for the proxy service, given the resolved forward address
    pub fn proxy_settings(&self, forward: SocketAddr) -> common::Result<ProxySettings> {
        Ok(ProxySettings {
            listen: self.listen_addr()?,
            forward,
            forward_timeout: self.forward_timeout(),
            buffer_size: self.buffer_size(),
        })
    }

    /// Settings for the telemetry publisher
    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            base_topic: self.base_topic().to_string(),
            send_json: self.send_json(),
        }
    }

    /// Merge two configurations, `other` wins where it has a value
    pub fn merge(&self, other: &ProxyConfig, source: ValueSource) -> Self {
        let mut result = self.clone();

        macro_rules! merge_field {
            ($name:ident) => {
                if other.values.$name.is_some() {
                    result.values.$name = other.values.$name.clone();
                    result.sources.insert(stringify!($name).to_string(), source);
                }
            };
        }

        // Network settings
        merge_field!(listen_ip);
        merge_field!(listen_port);
        merge_field!(forward_ip);
        merge_field!(forward_port);
        merge_field!(forward_timeout);
        merge_field!(portal);
        merge_field!(dns_retries);
        merge_field!(buffer_size);

        // General settings
        merge_field!(log_level);
        merge_field!(log_hex);

        // Publishing
        merge_field!(send_json);
        merge_field!(base_topic);

        if let Some(path) = &other.config_file {
            result.config_file = Some(path.clone());
        }

        result
    }

    /// Log the configuration
    pub fn log(&self) {
        debug!("=== Configuration ===");
        debug!("Network settings:");
        debug!("  Listen ip: '{}' (from {})", self.listen_ip(), self.source("listen_ip"));
        debug!("  Listen port: {} (from {})", self.listen_port(), self.source("listen_port"));
        debug!("  Forward ip: {:?} (from {})", self.forward_ip(), self.source("forward_ip"));
        debug!(
            "  Forward port: {} (from {})",
            self.forward_port(),
            if self.values.forward_port.is_some() {
                self.source("forward_port")
            } else {
                self.source("listen_port")
            }
        );
        debug!(
            "  Forward timeout: {:?} (from {})",
            self.forward_timeout(),
            self.source("forward_timeout")
        );
        debug!("  Portal: {:?} (from {})", self.portal(), self.source("portal"));
        debug!("  DNS retries: {} (from {})", self.dns_retries(), self.source("dns_retries"));
        debug!("  Buffer size: {} bytes (from {})", self.buffer_size(), self.source("buffer_size"));

        debug!("General settings:");
        debug!("  Log level: {} (from {})", self.log_level(), self.source("log_level"));
        debug!("  Hex logging: {} (from {})", self.log_hex(), self.source("log_hex"));

        debug!("Publishing:");
        debug!("  JSON: {} (from {})", self.send_json(), self.source("send_json"));
        debug!("  Base topic: {} (from {})", self.base_topic(), self.source("base_topic"));

        if let Some(file) = self.config_file() {
            debug!("  Configuration file: {}", file.display());
        }

        debug!("=====================");
    }
}
