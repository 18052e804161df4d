//! Proxy service implementation
//!
//! Composition root of the proxy: binds the listener, holds the forward
//! target and the inspection pipeline, and runs the multiplexer on its own
//! task. The returned [`ProxyHandle`] is the only way to talk to it.

use std::net::SocketAddr;
use std::time::Duration;

use log::{error, info};
use tokio::net::TcpListener;

use super::message::{create_channel, ProxyHandle};
use super::multiplexer::Multiplexer;
use super::registry::PairRegistry;
use crate::common::{bind_listener, Result};
use crate::inspect::{Inspector, Pipeline};

/// Default read buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default forward connect timeout
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Network settings of one proxy instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Address to accept inverter bridges on
    pub listen: SocketAddr,
    /// Portal address every client is paired with
    pub forward: SocketAddr,
    /// Bound on the forward connect
    pub forward_timeout: Duration,
    /// Maximum bytes per read
    pub buffer_size: usize,
}

impl ProxySettings {
    /// Settings with default timeout and buffer size
    pub fn new(listen: SocketAddr, forward: SocketAddr) -> Self {
        Self {
            listen,
            forward,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Proxy service trait
///
/// Implementations consume themselves on start and are controlled only
/// through the returned handle afterwards.
pub trait ProxyService {
    /// Start the proxy service
    fn start(self) -> Result<ProxyHandle>;
}

/// Standard proxy service implementation
pub struct StandardProxyService {
    listener: TcpListener,
    settings: ProxySettings,
    pipeline: Pipeline,
}

impl StandardProxyService {
    /// Bind the listen address
    ///
    /// Failing to bind is fatal; nothing is started.
    pub fn bind(settings: ProxySettings) -> Result<Self> {
        let listener = bind_listener(settings.listen)?;
        Ok(Self {
            listener,
            settings,
            pipeline: Pipeline::new(),
        })
    }

    /// Append an inspector to the pipeline
    pub fn with_inspector(mut self, inspector: Box<dyn Inspector>) -> Self {
        self.pipeline = self.pipeline.with(inspector);
        self
    }

    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Settings the service was bound with
    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }
}

impl ProxyService for StandardProxyService {
    fn start(self) -> Result<ProxyHandle> {
        let listen = self.local_addr()?;
        let (handle, rx) = create_channel();

        let registry = PairRegistry::new(self.settings.forward, self.settings.forward_timeout);
        let multiplexer = Multiplexer::new(
            self.listener,
            registry,
            self.pipeline,
            rx,
            self.settings.buffer_size,
        );

        info!("Proxy service started, listening on {}", listen);
        info!("Forwarding to {}", self.settings.forward);

        tokio::spawn(async move {
            if let Err(e) = multiplexer.run().await {
                error!("Proxy service error: {}", e);
            }
        });

        Ok(handle)
    }
}
