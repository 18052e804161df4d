//! Envertech bridge protocol
//!
//! Pure decoding of the chunks flowing through the proxy. A chunk is
//! classified once by its 6-byte prefix into a [`FrameKind`]; decoding then
//! branches on the kind. Nothing here performs I/O, and a malformed chunk
//! never escapes as a panic: it degrades to [`Decoded::Unknown`].

pub mod frame;
pub mod status;
pub mod telemetry;

pub use frame::{classify, Direction, FrameKind, HEADER_LEN, PREFIX_LEN};
pub use status::{AccountId, PackedTime, StatusFrame};
pub use telemetry::{DeviceId, PowerReading, Scale, TelemetryRecord, SLOT_LEN, STATUS_ONLINE};

use thiserror::Error;

/// Decoding error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The chunk is shorter than its kind requires
    #[error("{kind} frame truncated: need {needed} bytes, got {actual}")]
    Truncated {
        kind: FrameKind,
        needed: usize,
        actual: usize,
    },

    /// The kind has no status frame representation
    #[error("{0} is not a portal status frame")]
    NotStatus(FrameKind),
}

/// A chunk that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    /// Chunk length
    pub len: usize,
    /// Set when the prefix matched but the chunk was too short
    pub truncated: Option<DecodeError>,
}

/// Result of decoding one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Poll,
    WridAck,
    Monitoring(Vec<TelemetryRecord>),
    Status(StatusFrame),
    Unknown(UnknownFrame),
}

impl Decoded {
    /// Kind this chunk decoded as
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Poll => FrameKind::Poll,
            Self::WridAck => FrameKind::WridAck,
            Self::Monitoring(_) => FrameKind::MonitoringPayload,
            Self::Status(frame) => frame.kind(),
            Self::Unknown(_) => FrameKind::Unknown,
        }
    }
}

pub(crate) fn ensure_len(kind: FrameKind, data: &[u8]) -> Result<(), DecodeError> {
    if data.len() < kind.min_len() {
        return Err(DecodeError::Truncated {
            kind,
            needed: kind.min_len(),
            actual: data.len(),
        });
    }
    Ok(())
}

/// Classify and decode a chunk
pub fn decode(direction: Direction, data: &[u8]) -> Decoded {
    let kind = classify(direction, data);
    decode_kind(kind, data).unwrap_or_else(|e| {
        Decoded::Unknown(UnknownFrame {
            len: data.len(),
            truncated: Some(e),
        })
    })
}

fn decode_kind(kind: FrameKind, data: &[u8]) -> Result<Decoded, DecodeError> {
    ensure_len(kind, data)?;
    match kind {
        FrameKind::Poll => Ok(Decoded::Poll),
        FrameKind::WridAck => Ok(Decoded::WridAck),
        FrameKind::MonitoringPayload => telemetry::decode_monitoring(data).map(Decoded::Monitoring),
        FrameKind::Unknown => Ok(Decoded::Unknown(UnknownFrame {
            len: data.len(),
            truncated: None,
        })),
        _ => StatusFrame::parse(kind, data).map(Decoded::Status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_poll() {
        let data = hex::decode("68003068100601020304").unwrap();
        assert_eq!(decode(Direction::FromDevice, &data), Decoded::Poll);
    }

    #[test]
    fn test_decode_unknown_prefix() {
        let decoded = decode(Direction::FromPortal, b"\x01\x02\x03\x04\x05\x06\x07");
        assert_eq!(
            decoded,
            Decoded::Unknown(UnknownFrame { len: 7, truncated: None })
        );
    }

    #[test]
    fn test_truncated_frame_degrades_to_unknown() {
        let data = hex::decode("68001e681070a1b2c3d4").unwrap();
        match decode(Direction::FromPortal, &data) {
            Decoded::Unknown(UnknownFrame { truncated: Some(err), len }) => {
                assert_eq!(len, 10);
                assert!(err.to_string().contains("time_sync"));
            }
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_decoded_kind() {
        let data = hex::decode("680012681015a1b2c3d41402070d0000a116").unwrap();
        assert_eq!(decode(Direction::FromPortal, &data).kind(), FrameKind::Ack);
    }
}
