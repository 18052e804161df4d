//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::types::ConfigValues;

/// Intercepting proxy between an Envertech bridge and its portal
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(long, env = "ENVERPROXY_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Ip to listen on, empty for all interfaces
    #[arg(long)]
    pub listen_ip: Option<String>,

    /// Port the bridge connects to
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Static portal ip
    #[arg(long)]
    pub forward_ip: Option<String>,

    /// Portal port (defaults to the listen port)
    #[arg(long)]
    pub forward_port: Option<u16>,

    /// Forward connect timeout in seconds
    #[arg(long)]
    pub forward_timeout: Option<u64>,

    /// Portal host name to look up
    #[arg(long)]
    pub portal: Option<String>,

    /// Number of portal lookups
    #[arg(long)]
    pub dns_retries: Option<u32>,

    /// Read buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log frame bodies in hex
    #[arg(long)]
    pub log_hex: bool,

    /// Publish one JSON document per device
    #[arg(long)]
    pub send_json: bool,

    /// Topic prefix
    #[arg(long)]
    pub base_topic: Option<String>,
}

impl CliArgs {
    /// Values given on the command line; absent flags stay unset
    pub fn values(&self) -> ConfigValues {
        ConfigValues {
            listen_ip: self.listen_ip.clone(),
            listen_port: self.listen_port,
            forward_ip: self.forward_ip.clone(),
            forward_port: self.forward_port,
            forward_timeout: self.forward_timeout,
            portal: self.portal.clone(),
            dns_retries: self.dns_retries,
            buffer_size: self.buffer_size,
            log_level: self.log_level.clone(),
            log_hex: self.log_hex.then_some(true),
            send_json: self.send_json.then_some(true),
            base_topic: self.base_topic.clone(),
        }
    }
}
