//! Proxy message types
//!
//! The multiplexer owns all proxy state. Other tasks talk to it only
//! through these messages, so no state is shared or locked.

use tokio::sync::{mpsc, oneshot};

use crate::common::{ProxyError, Result};

/// Snapshot of the multiplexer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyStats {
    /// Open connections, both sides, listener excluded
    pub connections: usize,
    /// Live connection pairs
    pub pairs: usize,
    /// Clients accepted since start
    pub accepted: u64,
    /// Bytes written to paired connections since start
    pub bytes_forwarded: u64,
}

/// Messages that can be sent to the proxy service
#[derive(Debug)]
pub enum ProxyMessage {
    /// Close every connection and stop; `done` fires once the listener is closed
    Shutdown {
        /// Completion signal
        done: oneshot::Sender<()>,
    },
    /// Report the current counters
    Stats(oneshot::Sender<ProxyStats>),
}

/// Proxy control handle
///
/// Cheap to clone; every clone talks to the same running service.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    sender: mpsc::Sender<ProxyMessage>,
}

impl ProxyHandle {
    /// Create a new proxy handle
    pub fn new(sender: mpsc::Sender<ProxyMessage>) -> Self {
        Self { sender }
    }

    /// Send a message to the proxy service
    pub async fn send(&self, message: ProxyMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| ProxyError::Other("Proxy service is not running".to_string()))
    }

    /// Shut the service down and wait until it has stopped
    pub async fn shutdown(&self) -> Result<()> {
        let (done, stopped) = oneshot::channel();
        self.send(ProxyMessage::Shutdown { done }).await?;
        stopped.await.map_err(|_| {
            ProxyError::Other("Proxy service stopped without confirming shutdown".to_string())
        })
    }

    /// Fetch the current counters
    pub async fn stats(&self) -> Result<ProxyStats> {
        let (reply, response) = oneshot::channel();
        self.send(ProxyMessage::Stats(reply)).await?;
        response
            .await
            .map_err(|_| ProxyError::Other("Proxy service dropped the stats request".to_string()))
    }

    /// Whether the service has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Create a new proxy message channel
pub fn create_channel() -> (ProxyHandle, mpsc::Receiver<ProxyMessage>) {
    let (tx, rx) = mpsc::channel(16);
    (ProxyHandle::new(tx), rx)
}
