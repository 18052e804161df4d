//! Configuration builder
//!
//! This module provides a builder pattern for constructing configuration.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::cli::CliArgs;
use crate::config::defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
use crate::config::error::Result;
use crate::config::source::{CliSource, ConfigSource, DefaultSource, EnvSource, FileSource};
use crate::config::types::ProxyConfig;
use crate::config::validator::validate_config;

/// Configuration builder
///
/// Sources are applied in the order they are added, later ones win.
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    validate: bool,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            validate: true,
        }
    }

    /// Add default source
    pub fn with_defaults(self) -> Self {
        debug!("Adding default configuration source");
        self.with_source(DefaultSource)
    }

    /// Add an optional file source
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        debug!("Adding file configuration source: {}", path.as_ref().display());
        self.with_source(FileSource::new(path))
    }

    /// Add a file source that must exist
    pub fn with_required_file<P: AsRef<Path>>(self, path: P) -> Self {
        debug!("Adding required file configuration source: {}", path.as_ref().display());
        self.with_source(FileSource::required(path))
    }

    /// Add environment source
    pub fn with_env(self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.with_source(EnvSource::new(prefix))
    }

    /// Add command line source
    pub fn with_cli(self, args: CliArgs) -> Self {
        debug!("Adding command line configuration source");
        self.with_source(CliSource::new(args))
    }

    /// Add any source
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ProxyConfig> {
        let mut config = ProxyConfig::empty();

        debug!("Building configuration from {} sources", self.sources.len());

        for source in self.sources {
            let source_type = source.source_type();
            debug!("Loading configuration from source: {:?}", source_type);

            let source_config = source.load()?;
            config = config.merge(&source_config, source_type);
        }

        config.set_default_values();

        if self.validate {
            debug!("Validating configuration");
            validate_config(&config)?;
        }

        config.log();
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
            .with_defaults()
            .with_file(DEFAULT_CONFIG_FILE)
            .with_env(ENV_PREFIX)
    }
}

/// Load the configuration for the binary
///
/// Priority, lowest first: defaults, configuration file, environment
/// variables, command line. A file named explicitly (flag or
/// `ENVERPROXY_CONFIG_FILE`) must exist; the default file may be missing.
pub fn load(args: CliArgs) -> Result<ProxyConfig> {
    let builder = ConfigBuilder::new().with_defaults();

    let builder = match &args.config_file {
        Some(path) => {
            info!("Using configuration file: {}", path.display());
            builder.with_required_file(path)
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            debug!("Using default configuration file: {}", path.display());
            builder.with_file(path)
        }
    };

    let config = builder.with_env(ENV_PREFIX).with_cli(args).build()?;

    debug!("Configuration loaded successfully");
    Ok(config)
}
