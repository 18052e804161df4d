//! Enver Proxy command line tool
//!
//! Loads the configuration, starts the proxy and runs until SIGINT or
//! SIGTERM.

use clap::Parser;
use log::{error, info};

use enver_proxy::common::{apply_log_level, init_logger, Result};
use enver_proxy::config::{self, CliArgs};
use enver_proxy::inspect::{LogPublisher, TelemetryInspector};
use enver_proxy::proxy::{ProxyService, StandardProxyService};
use enver_proxy::{APP_NAME, VERSION};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_logger(args.log_level.as_deref().unwrap_or(config::defaults::LOG_LEVEL_STR));
    info!("Starting {} v{}", APP_NAME, VERSION);

    let config = config::load(args).map_err(|e| {
        error!("{}", e);
        e
    })?;
    apply_log_level(config.log_level());

    let forward = config.resolve_forward().await?;
    let settings = config.proxy_settings(forward)?;

    let publisher = LogPublisher::new(config.publish_settings());
    let inspector = TelemetryInspector::new(publisher, config.log_hex());
    let handle = StandardProxyService::bind(settings)
        .map_err(|e| {
            error!("Cannot listen on {}:{}: {}", config.listen_ip(), config.listen_port(), e);
            e
        })?
        .with_inspector(Box::new(inspector))
        .start()?;

    info!("Proxy service ready, press Ctrl+C to stop");
    wait_for_signal().await?;

    handle.shutdown().await?;
    info!("{} stopped", APP_NAME);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
