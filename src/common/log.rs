//! Logging helpers
//!
//! The proxy logs through the `log` facade; `env_logger` is the sink.

use log::LevelFilter;

/// Environment variable that overrides the configured log level
pub const LOG_ENV: &str = "RUST_LOG";

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when it is set. Otherwise the
/// sink accepts everything and the level is enforced through
/// [`apply_log_level`], so it can still change once the configuration
/// is loaded.
///
/// # Parameters
///
/// * `level` - Log level used when `RUST_LOG` is absent
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or(LOG_ENV, "trace");

    // A second initialisation (tests, embedding) keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();

    apply_log_level(level);
}

/// Lower or raise the effective log level after configuration is known
///
/// Has no effect when `RUST_LOG` is set or `level` is not a valid filter.
pub fn apply_log_level(level: &str) {
    if std::env::var_os(LOG_ENV).is_some() {
        return;
    }
    if let Some(filter) = parse_level(level) {
        log::set_max_level(filter);
    }
}

/// Parse a textual log level (error, warn, info, debug, trace, off)
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.trim().parse::<LevelFilter>().ok()
}
