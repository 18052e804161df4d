//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Enver proxy error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The forward connection was refused or failed
    #[error("Forward connection to {addr} failed: {source}")]
    ForwardConnect {
        /// Forward address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The forward connection did not complete in time
    #[error("Forward connection to {addr} timed out after {timeout:?}")]
    ForwardTimeout {
        /// Forward address
        addr: SocketAddr,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// A connection cannot be paired
    #[error("Pairing error: {0}")]
    Pairing(String),

    /// Address resolution error
    #[error("Network error: {0}")]
    Network(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl ProxyError {
    /// Whether this error only affects a single connection pair
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ForwardConnect { .. }
                | Self::ForwardTimeout { .. }
                | Self::Pairing(_)
        )
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let proxy_err: ProxyError = io_err.into();

        match proxy_err {
            ProxyError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ProxyError::Config("listen_port is missing".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("listen_port is missing"));

        let err = ProxyError::ForwardTimeout {
            addr: "10.0.0.1:10013".parse().unwrap(),
            timeout: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10.0.0.1:10013"));
    }

    #[test]
    fn test_transient_classification() {
        let refused = ProxyError::ForwardConnect {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_transient());
        assert!(!ProxyError::Config("bad".into()).is_transient());
    }
}
