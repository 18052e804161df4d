//! Common module
//!
//! This module contains shared errors and utility functions used throughout the application.

pub mod error;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use log::{apply_log_level, init_logger};
pub use net::{bind_listener, listen_addr, parse_socket_addr, resolve_forward};
