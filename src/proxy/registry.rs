//! Connection pair registry
//!
//! Maps every client-facing connection to the forward connection opened
//! for it, in both directions. Forward connections are opened lazily on
//! the first chunk that needs one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::connection::{ConnId, ConnectionSet, Role};
use crate::common::{ProxyError, Result};

/// Bidirectional inbound/outbound mapping
#[derive(Debug)]
pub struct PairRegistry {
    forward_addr: SocketAddr,
    connect_timeout: Duration,
    pairs: HashMap<ConnId, ConnId>,
}

impl PairRegistry {
    /// Create a registry opening forward connections to `forward_addr`
    pub fn new(forward_addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            forward_addr,
            connect_timeout,
            pairs: HashMap::new(),
        }
    }

    /// Forward address
    pub fn forward_addr(&self) -> SocketAddr {
        self.forward_addr
    }

    /// Time allowed to open a forward connection
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The other side of `conn`, if paired
    pub fn peer_of(&self, conn: ConnId) -> Option<ConnId> {
        self.pairs.get(&conn).copied()
    }

    /// Return the forward connection of `inbound`, opening it if needed
    ///
    /// The new forward connection is registered in `connections`. On
    /// failure nothing is installed and `inbound` stays open.
    pub async fn get_or_create(
        &mut self,
        inbound: ConnId,
        connections: &mut ConnectionSet,
    ) -> Result<ConnId> {
        if let Some(outbound) = self.peer_of(inbound) {
            return Ok(outbound);
        }

        match connections.get(inbound) {
            Some(conn) if conn.role == Role::ClientFacing => {}
            Some(_) => {
                return Err(ProxyError::Pairing(format!(
                    "{} is a forward connection",
                    inbound
                )))
            }
            None => return Err(ProxyError::Pairing(format!("{} is not open", inbound))),
        }

        let stream = self.connect().await?;
        let outbound = connections.insert(Role::ForwardFacing, self.forward_addr, stream);
        self.pairs.insert(inbound, outbound);
        self.pairs.insert(outbound, inbound);

        info!("Paired {} with forward connection {} to {}", inbound, outbound, self.forward_addr);
        Ok(outbound)
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = self.forward_addr;
        match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ProxyError::ForwardConnect { addr, source }),
            Err(_) => Err(ProxyError::ForwardTimeout {
                addr,
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Forget the pair of `conn` and close its peer
    ///
    /// `conn` itself is left to the caller. Returns the closed peer;
    /// calling this for an unpaired connection is a no-op.
    pub fn teardown(&mut self, conn: ConnId, connections: &mut ConnectionSet) -> Option<ConnId> {
        let peer = self.pairs.remove(&conn)?;
        self.pairs.remove(&peer);
        connections.remove(peer);

        debug!("Unpaired {} and {}", conn, peer);
        Some(peer)
    }

    /// Number of live pairs
    pub fn len(&self) -> usize {
        self.pairs.len() / 2
    }

    /// Whether no pair exists
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn accepted_client(set: &mut ConnectionSet) -> (ConnId, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, peer) = accepted.unwrap();
        (set.insert(Role::ClientFacing, peer, stream), client.unwrap())
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut registry =
            PairRegistry::new(upstream.local_addr().unwrap(), Duration::from_secs(2));
        let mut set = ConnectionSet::new();
        let (inbound, _client) = accepted_client(&mut set).await;

        let first = registry.get_or_create(inbound, &mut set).await.unwrap();
        let second = registry.get_or_create(inbound, &mut set).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(registry.peer_of(first), Some(inbound));
        assert_eq!(set.get(first).unwrap().role, Role::ForwardFacing);
    }

    #[tokio::test]
    async fn test_refused_connect_installs_nothing() {
        // Grab a free port, then close it so the connect is refused
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let mut registry = PairRegistry::new(addr, Duration::from_secs(2));
        let mut set = ConnectionSet::new();
        let (inbound, _client) = accepted_client(&mut set).await;

        let err = registry.get_or_create(inbound, &mut set).await.unwrap_err();

        assert!(err.is_transient());
        assert!(registry.is_empty());
        assert_eq!(set.len(), 1);
        assert!(set.contains(inbound));
    }

    #[tokio::test]
    async fn test_only_client_connections_are_paired() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut registry =
            PairRegistry::new(upstream.local_addr().unwrap(), Duration::from_secs(2));
        let mut set = ConnectionSet::new();

        let (stray, _client) = accepted_client(&mut set).await;
        let stream = set.remove(stray).unwrap().stream;
        let peer = stream.peer_addr().unwrap();
        let forward = set.insert(Role::ForwardFacing, peer, stream);

        assert!(matches!(
            registry.get_or_create(forward, &mut set).await,
            Err(ProxyError::Pairing(_))
        ));
        assert!(matches!(
            registry.get_or_create(stray, &mut set).await,
            Err(ProxyError::Pairing(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_teardown_is_symmetric() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut registry =
            PairRegistry::new(upstream.local_addr().unwrap(), Duration::from_secs(2));
        let mut set = ConnectionSet::new();
        let (inbound, _client) = accepted_client(&mut set).await;
        let outbound = registry.get_or_create(inbound, &mut set).await.unwrap();
        let (mut upstream_side, _) = upstream.accept().await.unwrap();

        assert_eq!(registry.teardown(inbound, &mut set), Some(outbound));
        assert_eq!(registry.peer_of(inbound), None);
        assert_eq!(registry.peer_of(outbound), None);
        assert!(!set.contains(outbound));

        // Second teardown of either side is a no-op
        assert_eq!(registry.teardown(inbound, &mut set), None);
        assert_eq!(registry.teardown(outbound, &mut set), None);

        let mut buf = [0u8; 4];
        assert_eq!(upstream_side.read(&mut buf).await.unwrap(), 0);
    }
}
