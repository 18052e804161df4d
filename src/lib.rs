//! Enver Proxy: intercepting TCP proxy for Envertech inverter bridges
//!
//! The inverter bridge talks to its cloud portal over a small binary
//! protocol. This crate sits in the middle: it accepts the bridge, opens a
//! connection to the portal on its behalf and relays every byte unchanged,
//! while decoding telemetry and portal status frames on the way through.
//!
//! # Main Features
//!
//! - Single-task readiness loop, no shared state or locks
//! - Lazy pairing of every bridge connection with a portal connection
//! - Ordered inspection pipeline applied to each read
//! - Decoding of monitoring payloads into per-device telemetry records
//!
//! # Example
//!
//! ```no_run
//! use enver_proxy::inspect::{LogPublisher, TelemetryInspector};
//! use enver_proxy::proxy::{ProxyService, ProxySettings, StandardProxyService};
//! use enver_proxy::Result;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let settings = ProxySettings::new(
//!         "0.0.0.0:10013".parse().unwrap(),
//!         "47.91.242.120:10013".parse().unwrap(),
//!     );
//!
//!     let handle = StandardProxyService::bind(settings)?
//!         .with_inspector(Box::new(TelemetryInspector::new(LogPublisher::default(), false)))
//!         .start()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod inspect;
pub mod protocol;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use common::{ProxyError, Result};
pub use config::ProxyConfig;
pub use proxy::{ProxyHandle, ProxyService, ProxySettings, StandardProxyService};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
