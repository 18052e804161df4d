//! Test for configuration priority order
//!
//! Command line arguments > Environment variables > Configuration file > Default values

use std::env;
use std::io::Write;

use clap::Parser;
use enver_proxy::config::{self, CliArgs, ConfigBuilder, ENV_PREFIX};
use serial_test::serial;
use tempfile::NamedTempFile;

const ENV_VARS: [&str; 4] = [
    "ENVERPROXY_LISTEN_PORT",
    "ENVERPROXY_BUFFER_SIZE",
    "ENVERPROXY_LOG_LEVEL",
    "ENVERPROXY_SEND_JSON",
];

fn clear_env() {
    for name in ENV_VARS {
        env::remove_var(name);
    }
}

fn config_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create config file");
    write!(
        file,
        r#"{{
            "listen_port": 10013,
            "forward_ip": "47.91.242.120",
            "log_level": "info",
            "buffer_size": 2048,
            "forward_timeout": 5,
            "base_topic": "solar"
        }}"#
    )
    .expect("Failed to write config file");
    file
}

#[test]
#[serial]
fn test_config_priority() {
    let file = config_file();

    env::set_var("ENVERPROXY_LISTEN_PORT", "10014");
    env::set_var("ENVERPROXY_BUFFER_SIZE", "4096");
    env::set_var("ENVERPROXY_LOG_LEVEL", "debug");

    let args =
        CliArgs::try_parse_from(["enver-proxy", "--log-level", "trace", "--log-hex"]).unwrap();

    let config = ConfigBuilder::new()
        .with_defaults()
        .with_file(file.path())
        .with_env(ENV_PREFIX)
        .with_cli(args)
        .build();
    clear_env();
    let config = config.expect("configuration should be valid");

    // Command line wins
    assert_eq!(config.log_level(), "trace");
    assert_eq!(config.source("log_level"), "command line");
    assert!(config.log_hex());

    // Environment beats file
    assert_eq!(config.listen_port(), 10014);
    assert_eq!(config.buffer_size(), 4096);
    assert_eq!(config.source("buffer_size"), "environment");

    // File beats defaults
    assert_eq!(config.forward_timeout().as_secs(), 5);
    assert_eq!(config.base_topic(), "solar");
    assert_eq!(config.source("base_topic"), "file");

    // Untouched values keep their defaults
    assert_eq!(config.dns_retries(), 3);
    assert!(!config.send_json());
    assert_eq!(config.source("send_json"), "default");

    // forward_port follows the effective listen port
    assert_eq!(config.forward_port(), 10014);
}

#[test]
#[serial]
fn test_load_with_explicit_config_file() {
    clear_env();
    let file = config_file();

    let args = CliArgs::try_parse_from([
        "enver-proxy",
        "--config-file",
        file.path().to_str().unwrap(),
        "--forward-port",
        "10020",
    ])
    .unwrap();

    let config = config::load(args).expect("configuration should load");
    assert_eq!(config.listen_port(), 10013);
    assert_eq!(config.forward_port(), 10020);
    assert_eq!(config.config_file(), Some(file.path()));

    let settings = config
        .proxy_settings("47.91.242.120:10020".parse().unwrap())
        .unwrap();
    assert_eq!(settings.listen.to_string(), "0.0.0.0:10013");
    assert_eq!(settings.buffer_size, 2048);
}

#[test]
#[serial]
fn test_env_bool_flag() {
    clear_env();
    let file = config_file();
    env::set_var("ENVERPROXY_SEND_JSON", "true");

    let config = ConfigBuilder::new()
        .with_defaults()
        .with_file(file.path())
        .with_env(ENV_PREFIX)
        .build();
    clear_env();

    let config = config.unwrap();
    assert!(config.send_json());
    assert!(config.publish_settings().send_json);
    assert_eq!(config.publish_settings().base_topic, "solar");
}

#[test]
#[serial]
fn test_invalid_env_value_is_ignored() {
    clear_env();
    let file = config_file();
    env::set_var("ENVERPROXY_BUFFER_SIZE", "lots");

    let config = ConfigBuilder::new()
        .with_defaults()
        .with_file(file.path())
        .with_env(ENV_PREFIX)
        .build();
    clear_env();

    assert_eq!(config.unwrap().buffer_size(), 2048);
}
