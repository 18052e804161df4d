//! Connection multiplexer
//!
//! A single task waits on the listener, on every open connection and on
//! the control channel at once. Whichever becomes ready first is handled
//! to completion before the next wait, so the connection set and the pair
//! registry are only ever touched from this loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::future::{self, select_all};
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use super::connection::{ConnId, ConnectionSet, Role};
use super::message::{ProxyMessage, ProxyStats};
use super::registry::PairRegistry;
use crate::common::Result;
use crate::inspect::{Chunk, Pipeline};

/// Pause after a failed accept, e.g. when file descriptors run out
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type ReadableFuture<'a> = Pin<Box<dyn Future<Output = (ConnId, io::Result<()>)> + Send + 'a>>;

/// What woke the loop up
enum Event {
    Control(ProxyMessage),
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Readable(ConnId, io::Result<()>),
}

/// The readiness loop
pub struct Multiplexer {
    listener: TcpListener,
    connections: ConnectionSet,
    registry: PairRegistry,
    pipeline: Pipeline,
    control: mpsc::Receiver<ProxyMessage>,
    buffer_size: usize,
    write_timeout: Duration,
    accepted: u64,
    bytes_forwarded: u64,
}

/// Wait until any connection is readable
///
/// Never resolves while the set is empty.
async fn next_readable(connections: &ConnectionSet) -> (ConnId, io::Result<()>) {
    if connections.is_empty() {
        return future::pending().await;
    }

    let waits: Vec<ReadableFuture<'_>> = connections
        .iter()
        .map(|conn| -> ReadableFuture<'_> {
            Box::pin(async move { (conn.id, conn.stream.readable().await) })
        })
        .collect();

    let (ready, _, _) = select_all(waits).await;
    ready
}

impl Multiplexer {
    /// Create a multiplexer around a bound listener
    ///
    /// Writes to a peer are bounded by the registry's connect timeout.
    pub fn new(
        listener: TcpListener,
        registry: PairRegistry,
        pipeline: Pipeline,
        control: mpsc::Receiver<ProxyMessage>,
        buffer_size: usize,
    ) -> Self {
        Self {
            listener,
            connections: ConnectionSet::new(),
            write_timeout: registry.connect_timeout(),
            registry,
            pipeline,
            control,
            buffer_size,
            accepted: 0,
            bytes_forwarded: 0,
        }
    }

    /// Current counters
    pub fn stats(&self) -> ProxyStats {
        ProxyStats {
            connections: self.connections.len(),
            pairs: self.registry.len(),
            accepted: self.accepted,
            bytes_forwarded: self.bytes_forwarded,
        }
    }

    /// Serve until a shutdown message arrives
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Multiplexer running with pipeline {:?}, forwarding to {}",
            self.pipeline.names(),
            self.registry.forward_addr()
        );

        loop {
            let event = tokio::select! {
                Some(message) = self.control.recv() => Event::Control(message),
                accepted = self.listener.accept() => Event::Accepted(accepted),
                (id, ready) = next_readable(&self.connections) => Event::Readable(id, ready),
            };

            match event {
                Event::Control(ProxyMessage::Shutdown { done }) => {
                    info!("Stopping server");
                    self.close_all();
                    drop(self);
                    let _ = done.send(());
                    return Ok(());
                }
                Event::Control(ProxyMessage::Stats(reply)) => {
                    let _ = reply.send(self.stats());
                }
                Event::Accepted(Ok((stream, peer))) => self.on_accept(stream, peer),
                Event::Accepted(Err(e)) => {
                    warn!("Error accepting connection: {}", e);
                    sleep(ACCEPT_BACKOFF).await;
                }
                Event::Readable(id, Ok(())) => self.on_readable(id).await,
                Event::Readable(id, Err(e)) => {
                    warn!("Connection {} failed: {}", id, e);
                    self.close_pair(id);
                }
            }
        }
    }

    fn on_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.connections.insert(Role::ClientFacing, peer, stream);
        self.accepted += 1;
        info!("{} has connected as {}", peer, id);

        metrics::counter!("enverproxy.connections.accepted").increment(1);
        self.update_active();
    }

    async fn on_readable(&mut self, id: ConnId) {
        let Some(conn) = self.connections.get(id) else {
            return;
        };
        let role = conn.role;

        let mut buf = BytesMut::zeroed(self.buffer_size);
        match conn.stream.try_read(&mut buf) {
            Ok(0) => {
                debug!("{} ({}) has disconnected", id, conn.peer);
                self.close_pair(id);
            }
            Ok(n) => {
                buf.truncate(n);
                self.forward(id, role, buf.freeze()).await;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!("Read from {} failed: {}", id, e);
                self.close_pair(id);
            }
        }
    }

    async fn forward(&mut self, id: ConnId, role: Role, data: Bytes) {
        let read = data.len();
        let data = self.pipeline.process(Chunk::new(role.direction(), data));
        if data.is_empty() {
            debug!("Pipeline consumed {} bytes from {}", read, id);
            return;
        }

        let peer = match role {
            Role::ClientFacing => {
                match self.registry.get_or_create(id, &mut self.connections).await {
                    Ok(peer) => peer,
                    Err(e) => {
                        warn!(
                            "Could not establish forward connection for {}, dropping {} bytes: {}",
                            id,
                            data.len(),
                            e
                        );
                        metrics::counter!("enverproxy.forward.failures").increment(1);
                        self.update_active();
                        return;
                    }
                }
            }
            Role::ForwardFacing => match self.registry.peer_of(id) {
                Some(peer) => peer,
                None => {
                    warn!("Forward connection {} has no client, dropping {} bytes", id, data.len());
                    return;
                }
            },
        };
        self.update_active();

        let Some(target) = self.connections.get_mut(peer) else {
            warn!("Peer {} of {} is gone", peer, id);
            self.close_pair(id);
            return;
        };

        let limit = self.write_timeout;
        match timeout(limit, target.stream.write_all(&data)).await {
            Ok(Ok(())) => {
                debug!("Forwarded {} bytes {} -> {}", data.len(), id, peer);
                self.bytes_forwarded += data.len() as u64;
                metrics::counter!("enverproxy.bytes.forwarded").increment(data.len() as u64);
            }
            Ok(Err(e)) => {
                warn!("Write to {} failed: {}", peer, e);
                self.close_pair(id);
            }
            Err(_) => {
                warn!("Write to {} did not complete within {:?}", peer, limit);
                self.close_pair(id);
            }
        }
    }

    /// Close `id` and its peer
    fn close_pair(&mut self, id: ConnId) {
        self.registry.teardown(id, &mut self.connections);
        self.connections.remove(id);
        self.update_active();
    }

    /// Close every connection except the listener
    fn close_all(&mut self) {
        let ids = self.connections.ids();
        info!("Closing {} connection(s)", ids.len());
        for id in ids {
            self.close_pair(id);
        }
    }

    fn update_active(&self) {
        metrics::gauge!("enverproxy.connections.active").set(self.connections.len() as f64);
    }
}
