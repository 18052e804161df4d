//! Frame classification
//!
//! Every chunk is classified once by its leading 6-byte prefix. The
//! lookup is direction specific: a device prefix arriving from the portal
//! is not recognised.

use std::fmt;

/// Length of the distinguishing prefix
pub const PREFIX_LEN: usize = 6;

/// Prefix plus the 4-byte account id shared by all frames
pub const HEADER_LEN: usize = 10;

/// Direction of a chunk through the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by the inverter bridge towards the portal
    FromDevice,
    /// Sent by the portal towards the inverter bridge
    FromPortal,
}

impl Direction {
    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromDevice => "device",
            Self::FromPortal => "portal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame kinds known to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Bridge poll
    Poll,
    /// Bridge acknowledges the device list
    WridAck,
    /// Repeating 32-byte telemetry slots
    MonitoringPayload,
    /// Remote command for the bridge
    BridgeCommand,
    /// Device ids the bridge should report
    SetDeviceList,
    /// Energy counter and date
    DateSync,
    /// Portal acknowledgment
    Ack,
    /// Portal clock
    TimeSync,
    /// Anything not in the table
    Unknown,
}

impl FrameKind {
    /// Minimum chunk length needed to decode this kind
    pub const fn min_len(self) -> usize {
        match self {
            Self::Poll | Self::WridAck => PREFIX_LEN,
            Self::MonitoringPayload => 22,
            Self::BridgeCommand => 30,
            Self::SetDeviceList => 22,
            Self::DateSync => 18,
            Self::Ack => 16,
            Self::TimeSync => 20,
            Self::Unknown => 0,
        }
    }

    /// Expected direction, `None` for `Unknown`
    pub fn direction(self) -> Option<Direction> {
        FRAME_TABLE.iter().find(|entry| entry.kind == self).map(|entry| entry.direction)
    }

    /// Table prefix, `None` for `Unknown`
    pub fn prefix(self) -> Option<[u8; PREFIX_LEN]> {
        FRAME_TABLE.iter().find(|entry| entry.kind == self).map(|entry| entry.prefix)
    }

    /// Stable name used in logs and metrics labels
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::WridAck => "wrid_ack",
            Self::MonitoringPayload => "monitoring",
            Self::BridgeCommand => "bridge_command",
            Self::SetDeviceList => "set_device_list",
            Self::DateSync => "date_sync",
            Self::Ack => "ack",
            Self::TimeSync => "time_sync",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct FrameEntry {
    prefix: [u8; PREFIX_LEN],
    direction: Direction,
    kind: FrameKind,
}

const FRAME_TABLE: [FrameEntry; 8] = [
    FrameEntry {
        prefix: [0x68, 0x00, 0x30, 0x68, 0x10, 0x06],
        direction: Direction::FromDevice,
        kind: FrameKind::Poll,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x30, 0x68, 0x10, 0x10],
        direction: Direction::FromDevice,
        kind: FrameKind::WridAck,
    },
    FrameEntry {
        prefix: [0x68, 0x03, 0xd6, 0x68, 0x10, 0x04],
        direction: Direction::FromDevice,
        kind: FrameKind::MonitoringPayload,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x30, 0x68, 0x10, 0x07],
        direction: Direction::FromPortal,
        kind: FrameKind::BridgeCommand,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x20, 0x68, 0x10, 0x09],
        direction: Direction::FromPortal,
        kind: FrameKind::SetDeviceList,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x20, 0x68, 0x10, 0x27],
        direction: Direction::FromPortal,
        kind: FrameKind::DateSync,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x12, 0x68, 0x10, 0x15],
        direction: Direction::FromPortal,
        kind: FrameKind::Ack,
    },
    FrameEntry {
        prefix: [0x68, 0x00, 0x1e, 0x68, 0x10, 0x70],
        direction: Direction::FromPortal,
        kind: FrameKind::TimeSync,
    },
];

/// Classify a chunk by its prefix
pub fn classify(direction: Direction, data: &[u8]) -> FrameKind {
    let Some(prefix) = data.get(..PREFIX_LEN) else {
        return FrameKind::Unknown;
    };

    FRAME_TABLE
        .iter()
        .find(|entry| entry.direction == direction && entry.prefix[..] == *prefix)
        .map(|entry| entry.kind)
        .unwrap_or(FrameKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_device_frames() {
        let poll = hex::decode("680030681006aabbccdd").unwrap();
        assert_eq!(classify(Direction::FromDevice, &poll), FrameKind::Poll);

        let ack = hex::decode("680030681010").unwrap();
        assert_eq!(classify(Direction::FromDevice, &ack), FrameKind::WridAck);

        let mon = hex::decode("6803d6681004").unwrap();
        assert_eq!(classify(Direction::FromDevice, &mon), FrameKind::MonitoringPayload);
    }

    #[test]
    fn test_classify_portal_frames() {
        let cases = [
            ("680030681007", FrameKind::BridgeCommand),
            ("680020681009", FrameKind::SetDeviceList),
            ("680020681027", FrameKind::DateSync),
            ("680012681015", FrameKind::Ack),
            ("68001e681070", FrameKind::TimeSync),
        ];
        for (prefix, kind) in cases {
            let data = hex::decode(prefix).unwrap();
            assert_eq!(classify(Direction::FromPortal, &data), kind, "prefix {}", prefix);
        }
    }

    #[test]
    fn test_classify_is_direction_specific() {
        let poll = hex::decode("680030681006").unwrap();
        assert_eq!(classify(Direction::FromPortal, &poll), FrameKind::Unknown);

        let ack = hex::decode("680012681015").unwrap();
        assert_eq!(classify(Direction::FromDevice, &ack), FrameKind::Unknown);
    }

    #[test]
    fn test_classify_short_and_foreign() {
        assert_eq!(classify(Direction::FromDevice, &[0x68, 0x00, 0x30]), FrameKind::Unknown);
        assert_eq!(classify(Direction::FromDevice, b""), FrameKind::Unknown);
        assert_eq!(classify(Direction::FromDevice, b"GET / HTTP/1.1"), FrameKind::Unknown);
    }

    #[test]
    fn test_prefix_roundtrip_through_table() {
        let prefix = FrameKind::TimeSync.prefix().unwrap();
        assert_eq!(classify(Direction::FromPortal, &prefix), FrameKind::TimeSync);
        assert_eq!(FrameKind::TimeSync.direction(), Some(Direction::FromPortal));
        assert_eq!(FrameKind::Unknown.prefix(), None);
    }
}
