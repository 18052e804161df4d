//! Network utility functions
//!
//! Address parsing, listener construction and forward address discovery.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use super::error::{ProxyError, Result};

/// Pending connection backlog of the listening socket
pub const LISTEN_BACKLOG: i32 = 16;

/// Pause between two portal lookups
const DNS_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Parse a socket address
///
/// # Arguments
///
/// * `addr` - The address string to parse
///
/// # Returns
///
/// The parsed `SocketAddr`
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    // Try direct parsing first
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    // Try using ToSocketAddrs trait
    match addr.to_socket_addrs() {
        Ok(mut addrs) => {
            if let Some(addr) = addrs.next() {
                Ok(addr)
            } else {
                Err(ProxyError::Network(format!("Failed to parse address: {}", addr)))
            }
        }
        Err(e) => Err(ProxyError::Network(format!("Failed to parse address {}: {}", addr, e))),
    }
}

/// Build the listen address from an ip string and a port
///
/// An empty ip binds all IPv4 interfaces.
pub fn listen_addr(ip: &str, port: u16) -> Result<SocketAddr> {
    if ip.trim().is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    let ip = IpAddr::from_str(ip.trim())
        .map_err(|e| ProxyError::Config(format!("Invalid listen_ip '{}': {}", ip, e)))?;
    Ok(SocketAddr::new(ip, port))
}

/// Bind a listening socket with `SO_REUSEADDR`
///
/// Must be called from within a tokio runtime.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    let listener = TcpListener::from_std(socket.into())?;
    debug!("Listener bound on {}", addr);
    Ok(listener)
}

/// Discover the forward address
///
/// The portal host name is tried first, `retries` times. The static
/// `fallback_ip` is used when the lookup yields nothing.
pub async fn resolve_forward(
    portal: Option<&str>,
    fallback_ip: Option<&str>,
    port: u16,
    retries: u32,
) -> Result<SocketAddr> {
    if let Some(portal) = portal.filter(|p| !p.trim().is_empty()) {
        for attempt in 0..retries {
            match tokio::net::lookup_host((portal, port)).await {
                Ok(mut addrs) => {
                    if let Some(addr) = addrs.find(|a| a.is_ipv4()) {
                        info!("using {} for portal access", addr.ip());
                        return Ok(addr);
                    }
                    warn!("dns record for {} empty", portal);
                }
                Err(e) => info!("dns lookup for {} failed ({}): {}", portal, attempt, e),
            }
            tokio::time::sleep(DNS_RETRY_DELAY).await;
        }
        warn!("dns lookup failed, using fallback");
    }

    match fallback_ip.filter(|ip| !ip.trim().is_empty()) {
        Some(ip) => parse_socket_addr(&format!("{}:{}", ip.trim(), port)),
        None => Err(ProxyError::Config(
            "forward_ip is required when the portal cannot be resolved".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_addr() {
        let addr = parse_socket_addr("127.0.0.1:10013");
        assert!(addr.is_ok(), "Should be able to parse a valid address");

        if let Ok(socket_addr) = addr {
            assert_eq!(socket_addr.port(), 10013);
        }

        let addr = parse_socket_addr("invalid-address");
        assert!(addr.is_err(), "Should fail to parse an invalid address");
    }

    #[test]
    fn test_listen_addr() {
        let any = listen_addr("", 10013).unwrap();
        assert_eq!(any.to_string(), "0.0.0.0:10013");

        let local = listen_addr("127.0.0.1", 10014).unwrap();
        assert_eq!(local.to_string(), "127.0.0.1:10014");

        assert!(listen_addr("not-an-ip", 1).is_err());
    }

    #[tokio::test]
    async fn test_bind_listener_ephemeral() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_resolve_forward_fallback() {
        let addr = resolve_forward(None, Some("192.168.1.20"), 10013, 3).await.unwrap();
        assert_eq!(addr.to_string(), "192.168.1.20:10013");

        let missing = resolve_forward(None, None, 10013, 3).await;
        assert!(matches!(missing, Err(ProxyError::Config(_))));
    }

    #[tokio::test]
    async fn test_resolve_forward_portal_ip_literal() {
        let addr = resolve_forward(Some("127.0.0.1"), None, 10013, 1).await.unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:10013");
    }
}
