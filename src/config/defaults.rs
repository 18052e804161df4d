//! Default configuration values
//!
//! Single source of truth for defaults and well-known names.

use std::time::Duration;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "ENVERPROXY_";

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/enverproxy.json";

/// Default listen ip, empty binds all interfaces
pub const LISTEN_IP_STR: &str = "";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default publish topic prefix
pub const BASE_TOPIC_STR: &str = crate::inspect::publish::DEFAULT_BASE_TOPIC;

/// Default forward connect timeout in seconds
pub const FORWARD_TIMEOUT_SECS: u64 = 10;

/// Default number of portal lookups
pub const DNS_RETRIES: u32 = 3;

/// Default read buffer size
pub const BUFFER_SIZE: usize = 1024;

/// Default forward connect timeout
pub fn forward_timeout() -> Duration {
    Duration::from_secs(FORWARD_TIMEOUT_SECS)
}
