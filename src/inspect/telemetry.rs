//! Telemetry inspector
//!
//! Decodes every chunk, logs a summary, and hands decoded records and
//! status frames to a [`Publisher`]. The chunk itself is always forwarded
//! unchanged.

use std::collections::HashMap;

use bytes::Bytes;
use log::{debug, info, warn};

use super::publish::Publisher;
use super::Inspector;
use crate::protocol::{self, telemetry, Decoded, Direction, FrameKind, HEADER_LEN};

/// Per-kind frame counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    frames: HashMap<FrameKind, u64>,
    records: u64,
}

impl FrameStats {
    /// Frames seen of one kind
    pub fn count(&self, kind: FrameKind) -> u64 {
        self.frames.get(&kind).copied().unwrap_or(0)
    }

    /// Telemetry records published
    pub fn records(&self) -> u64 {
        self.records
    }

    fn record_frame(&mut self, kind: FrameKind) {
        *self.frames.entry(kind).or_insert(0) += 1;
    }
}

/// Inspector decoding the bridge protocol
pub struct TelemetryInspector<P> {
    publisher: P,
    log_hex: bool,
    stats: FrameStats,
}

impl<P: Publisher> TelemetryInspector<P> {
    /// Create an inspector publishing to `publisher`
    ///
    /// With `log_hex` every known frame body is also logged in hex.
    pub fn new(publisher: P, log_hex: bool) -> Self {
        Self {
            publisher,
            log_hex,
            stats: FrameStats::default(),
        }
    }

    /// Counters collected so far
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The wrapped publisher
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn body_hex(data: &[u8]) -> String {
        hex::encode(data.get(HEADER_LEN..).unwrap_or(&[]))
    }

    fn handle(&mut self, direction: Direction, data: &[u8], decoded: &Decoded) {
        match decoded {
            Decoded::Poll => {
                if self.log_hex {
                    info!("ClientPoll as hex: {}", Self::body_hex(data));
                }
            }
            Decoded::WridAck => {
                info!("ClientWridAck");
                if self.log_hex {
                    info!("ClientAck as hex: {}", Self::body_hex(data));
                }
            }
            Decoded::Monitoring(records) => {
                if self.log_hex {
                    info!(
                        "ClientMonData as hex: {} {} empty",
                        Self::body_hex(data),
                        telemetry::trailing_empty_slots(data)
                    );
                }
                for record in records {
                    info!("{}", record);
                    self.publisher.publish_record(record);
                    self.stats.records += 1;
                }
            }
            Decoded::Status(frame) => {
                if self.log_hex {
                    info!("{} hex: {}", frame.kind(), Self::body_hex(data));
                }
                info!("{}", frame);
                self.publisher.publish_status(frame);
            }
            Decoded::Unknown(unknown) => {
                match &unknown.truncated {
                    Some(err) => warn!("{} sent a malformed message: {}", direction, err),
                    None => warn!(
                        "{} sent message with unknown content and length {}",
                        direction, unknown.len
                    ),
                }
                debug!("unknown {} data as hex: {}", direction, hex::encode(data));
            }
        }
    }
}

impl<P: Publisher + Send> Inspector for TelemetryInspector<P> {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn inspect(&mut self, direction: Direction, data: Bytes) -> Bytes {
        debug!("inspecting {} data ({} bytes)", direction, data.len());

        let decoded = protocol::decode(direction, &data);
        let kind = decoded.kind();
        self.stats.record_frame(kind);
        metrics::counter!("enverproxy.frames", "kind" => kind.as_str()).increment(1);

        self.handle(direction, &data, &decoded);
        data
    }
}
