//! Inspection pipeline
//!
//! Every chunk read by the multiplexer passes through an ordered list of
//! inspectors before it is forwarded. An inspector may log, publish and
//! rewrite the chunk; the output of one inspector is the input of the next.
//!
//! Chunks follow TCP read boundaries, not frame boundaries. Inspectors work
//! on whatever one read returned.

pub mod publish;
pub mod telemetry;

pub use publish::{LogPublisher, PublishSettings, Publisher};
pub use telemetry::{FrameStats, TelemetryInspector};

use bytes::Bytes;
use log::trace;

pub use crate::protocol::Direction;

/// A chunk read from one side of a connection pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Side the bytes came from
    pub direction: Direction,
    /// Bytes as read from the socket
    pub data: Bytes,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(direction: Direction, data: impl Into<Bytes>) -> Self {
        Self {
            direction,
            data: data.into(),
        }
    }
}

/// A transform applied to every chunk
pub trait Inspector: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Inspect a chunk and return the bytes to forward
    ///
    /// Returning an empty buffer suppresses forwarding of this chunk.
    fn inspect(&mut self, direction: Direction, data: Bytes) -> Bytes;
}

/// Ordered list of inspectors, fixed before the proxy starts
#[derive(Default)]
pub struct Pipeline {
    inspectors: Vec<Box<dyn Inspector>>,
}

impl Pipeline {
    /// Create an empty pipeline (forwards chunks unchanged)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an inspector
    pub fn with(mut self, inspector: Box<dyn Inspector>) -> Self {
        self.inspectors.push(inspector);
        self
    }

    /// Number of inspectors
    pub fn len(&self) -> usize {
        self.inspectors.len()
    }

    /// Whether no inspector is registered
    pub fn is_empty(&self) -> bool {
        self.inspectors.is_empty()
    }

    /// Inspector names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.inspectors.iter().map(|i| i.name()).collect()
    }

    /// Run a chunk through every inspector in order
    pub fn process(&mut self, chunk: Chunk) -> Bytes {
        let Chunk { direction, mut data } = chunk;
        for inspector in &mut self.inspectors {
            data = inspector.inspect(direction, data);
            trace!("{} returned {} bytes", inspector.name(), data.len());
        }
        data
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("inspectors", &self.names())
            .finish()
    }
}
