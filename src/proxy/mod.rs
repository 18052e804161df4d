//! Proxy service module
//!
//! Accepts inverter bridges, pairs each with a forward connection to the
//! portal and relays bytes both ways through the inspection pipeline.
//!
//! Everything runs on one task. The multiplexer owns the connection set and
//! the pair registry; the outside world reaches it only via [`ProxyHandle`].

pub mod connection;
mod message;
mod multiplexer;
pub mod registry;
mod service;

pub use connection::{ConnId, Connection, ConnectionSet, Role};
pub use message::{create_channel, ProxyHandle, ProxyMessage, ProxyStats};
pub use multiplexer::Multiplexer;
pub use registry::PairRegistry;
pub use service::{
    ProxyService, ProxySettings, StandardProxyService, DEFAULT_BUFFER_SIZE,
    DEFAULT_FORWARD_TIMEOUT,
};
