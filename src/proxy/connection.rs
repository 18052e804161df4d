//! Active connection set
//!
//! The multiplexer owns every established socket through a
//! [`ConnectionSet`]. A connection is open exactly as long as it is in the
//! set; removing it drops and thereby closes the socket.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use log::{debug, error};
use tokio::net::TcpStream;

use crate::protocol::Direction;

/// Handle of a connection in the active set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Reserved handle of the listening socket
    pub const LISTENER: ConnId = ConnId(0);

    /// Raw handle value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of a pair a connection is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted from the inverter bridge
    ClientFacing,
    /// Opened by the proxy towards the portal
    ForwardFacing,
}

impl Role {
    /// Direction of the chunks read from a connection with this role
    pub fn direction(self) -> Direction {
        match self {
            Self::ClientFacing => Direction::FromDevice,
            Self::ForwardFacing => Direction::FromPortal,
        }
    }
}

/// An established connection
#[derive(Debug)]
pub struct Connection {
    /// Handle in the active set
    pub id: ConnId,
    /// Side of the pair
    pub role: Role,
    /// Remote address
    pub peer: SocketAddr,
    /// The socket
    pub stream: TcpStream,
}

impl Connection {
    /// Direction tag fixed at creation
    pub fn direction(&self) -> Direction {
        self.role.direction()
    }
}

/// Every established connection, keyed by handle
#[derive(Debug)]
pub struct ConnectionSet {
    next_id: u64,
    connections: BTreeMap<ConnId, Connection>,
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self {
            next_id: ConnId::LISTENER.0 + 1,
            connections: BTreeMap::new(),
        }
    }
}

impl ConnectionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket and return its new handle
    pub fn insert(&mut self, role: Role, peer: SocketAddr, stream: TcpStream) -> ConnId {
        let id = ConnId(self.next_id);
        self.next_id += 1;

        debug!("Registered {:?} connection {} ({})", role, id, peer);
        self.connections.insert(id, Connection { id, role, peer, stream });
        id
    }

    /// Look up a connection
    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Look up a connection for writing
    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Whether `id` is still open
    pub fn contains(&self, id: ConnId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Remove and close a connection
    ///
    /// The listener cannot be removed this way.
    pub fn remove(&mut self, id: ConnId) -> Option<Connection> {
        if id == ConnId::LISTENER {
            error!("tried to close listener");
            return None;
        }

        let conn = self.connections.remove(&id)?;
        debug!("Closed connection {} ({})", id, conn.peer);
        Some(conn)
    }

    /// Handles of all open connections in ascending order
    pub fn ids(&self) -> Vec<ConnId> {
        self.connections.keys().copied().collect()
    }

    /// Iterate over open connections
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn test_role_direction() {
        assert_eq!(Role::ClientFacing.direction(), Direction::FromDevice);
        assert_eq!(Role::ForwardFacing.direction(), Direction::FromPortal);
    }

    #[test]
    fn test_conn_id_display() {
        assert_eq!(ConnId::LISTENER.to_string(), "#0");
    }

    #[tokio::test]
    async fn test_insert_assigns_fresh_ids() {
        let mut set = ConnectionSet::new();
        let (a, _a_peer) = stream_pair().await;
        let (b, _b_peer) = stream_pair().await;
        let peer = a.peer_addr().unwrap();

        let first = set.insert(Role::ClientFacing, peer, a);
        let second = set.insert(Role::ForwardFacing, peer, b);

        assert_ne!(first, ConnId::LISTENER);
        assert_ne!(first, second);
        assert_eq!(set.ids(), vec![first, second]);
        assert_eq!(set.get(second).unwrap().direction(), Direction::FromPortal);
    }

    #[tokio::test]
    async fn test_remove_closes_socket() {
        use tokio::io::AsyncReadExt;

        let mut set = ConnectionSet::new();
        let (local, mut remote) = stream_pair().await;
        let peer = local.peer_addr().unwrap();
        let id = set.insert(Role::ClientFacing, peer, local);

        assert!(set.remove(id).is_some());
        assert!(set.is_empty());
        assert!(set.remove(id).is_none());

        let mut buf = [0u8; 8];
        assert_eq!(remote.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn test_listener_cannot_be_removed() {
        let mut set = ConnectionSet::new();
        assert!(set.remove(ConnId::LISTENER).is_none());
    }
}
