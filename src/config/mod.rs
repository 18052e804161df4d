//! Configuration module
//!
//! Configuration is layered: defaults, a JSON file, environment variables
//! prefixed with `ENVERPROXY_`, and finally the command line. Each value
//! remembers the layer it came from.

pub mod builder;
pub mod cli;
pub mod defaults;
pub mod error;
pub mod source;
pub mod types;
pub mod validator;

pub use builder::{load, ConfigBuilder};
pub use cli::CliArgs;
pub use defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use error::ConfigError;
pub use source::ConfigSource;
pub use types::{ConfigValues, ProxyConfig, ValueSource};
pub use validator::{validate_config, ConfigValidator};
