//! Portal status frames
//!
//! Frames sent by the portal towards the bridge. Every frame starts with
//! the 6-byte prefix followed by the 4-byte account id and ends with a
//! 2-byte trailer that looks like a checksum; the trailer is not verified.

use std::fmt;

use serde::Serialize;

use super::frame::{FrameKind, HEADER_LEN};
use super::telemetry::DeviceId;
use super::DecodeError;

/// Maximum number of devices in a device list frame
pub const MAX_DEVICES: usize = 3;

const TRAILER_LEN: usize = 2;

/// Portal account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccountId(pub [u8; 4]);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for AccountId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Date and time packed one byte per field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackedTime {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    /// Only time sync frames carry seconds
    pub second: Option<u8>,
}

impl fmt::Display for PackedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}. {:02}:{:02}", self.day, self.month, self.hour, self.minute)?;
        if let Some(second) = self.second {
            write!(f, ":{:02}", second)?;
        }
        Ok(())
    }
}

/// Remote command for the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeCommand {
    pub account: AccountId,
    pub device: DeviceId,
    pub status: u16,
    /// Command code, `0x1103` is observed before a bridge reboot
    pub command: u16,
    /// Everything between header and trailer
    #[serde(serialize_with = "serialize_hex")]
    pub fields: Vec<u8>,
}

/// Devices the bridge should report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceList {
    pub account: AccountId,
    pub devices: Vec<DeviceId>,
}

/// Energy counter and date pushed by the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateSync {
    pub account: AccountId,
    /// Energy counter in hundredths of a kWh
    pub power_counter: u32,
    pub time: PackedTime,
    #[serde(serialize_with = "serialize_hex")]
    pub trailer: Vec<u8>,
}

impl DateSync {
    /// Energy counter in kWh
    pub fn energy_kwh(&self) -> f64 {
        f64::from(self.power_counter) / 100.0
    }
}

/// Portal acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub account: AccountId,
    /// Echoed device id and flags
    #[serde(serialize_with = "serialize_hex")]
    pub echo: Vec<u8>,
}

/// Portal clock (China standard time)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSync {
    pub account: AccountId,
    pub variant: u8,
    pub time: PackedTime,
    #[serde(serialize_with = "serialize_hex")]
    pub leading: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    pub trailer: Vec<u8>,
}

/// Structured view of a portal frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusFrame {
    BridgeCommand(BridgeCommand),
    SetDeviceList(DeviceList),
    DateSync(DateSync),
    Ack(Ack),
    TimeSync(TimeSync),
}

fn serialize_hex<S: serde::Serializer>(
    bytes: &Vec<u8>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn be_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn be_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Slice `at..end`, clamped to the frame length
fn block(data: &[u8], at: usize, end: usize) -> Vec<u8> {
    let end = end.min(data.len());
    data.get(at..end).map(<[u8]>::to_vec).unwrap_or_default()
}

impl StatusFrame {
    /// Decode a portal frame of the given kind
    ///
    /// # Errors
    ///
    /// `Truncated` when `data` is shorter than the kind requires,
    /// `NotStatus` for device-side and unknown kinds.
    pub fn parse(kind: FrameKind, data: &[u8]) -> Result<Self, DecodeError> {
        if !matches!(
            kind,
            FrameKind::BridgeCommand
                | FrameKind::SetDeviceList
                | FrameKind::DateSync
                | FrameKind::Ack
                | FrameKind::TimeSync
        ) {
            return Err(DecodeError::NotStatus(kind));
        }
        super::ensure_len(kind, data)?;

        let mut account = [0u8; 4];
        account.copy_from_slice(&data[6..HEADER_LEN]);
        let account = AccountId(account);
        let body_end = data.len() - TRAILER_LEN;

        let frame = match kind {
            FrameKind::BridgeCommand => Self::BridgeCommand(BridgeCommand {
                account,
                device: DeviceId::from_slice(&data[20..24]).unwrap_or_default(),
                status: be_u16(data, 24),
                command: be_u16(data, 28),
                fields: block(data, HEADER_LEN, body_end),
            }),
            FrameKind::SetDeviceList => Self::SetDeviceList(DeviceList {
                account,
                devices: data[20..body_end]
                    .chunks_exact(4)
                    .filter_map(DeviceId::from_slice)
                    .filter(|id| !id.is_sentinel())
                    .take(MAX_DEVICES)
                    .collect(),
            }),
            FrameKind::DateSync => Self::DateSync(DateSync {
                account,
                power_counter: be_u32(data, 10),
                time: PackedTime {
                    hour: data[14],
                    minute: data[15],
                    month: data[16],
                    day: data[17],
                    second: None,
                },
                trailer: block(data, 18, 32),
            }),
            FrameKind::Ack => Self::Ack(Ack {
                account,
                echo: block(data, HEADER_LEN, 16),
            }),
            FrameKind::TimeSync => Self::TimeSync(TimeSync {
                account,
                variant: data[14],
                time: PackedTime {
                    month: data[15],
                    day: data[16],
                    hour: data[17],
                    minute: data[18],
                    second: Some(data[19]),
                },
                leading: block(data, HEADER_LEN, 14),
                trailer: block(data, 20, 30),
            }),
            _ => return Err(DecodeError::NotStatus(kind)),
        };
        Ok(frame)
    }

    /// Kind of this frame
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::BridgeCommand(_) => FrameKind::BridgeCommand,
            Self::SetDeviceList(_) => FrameKind::SetDeviceList,
            Self::DateSync(_) => FrameKind::DateSync,
            Self::Ack(_) => FrameKind::Ack,
            Self::TimeSync(_) => FrameKind::TimeSync,
        }
    }

    /// Portal account the frame belongs to
    pub fn account(&self) -> AccountId {
        match self {
            Self::BridgeCommand(f) => f.account,
            Self::SetDeviceList(f) => f.account,
            Self::DateSync(f) => f.account,
            Self::Ack(f) => f.account,
            Self::TimeSync(f) => f.account,
        }
    }
}

impl fmt::Display for StatusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BridgeCommand(cmd) => write!(f, "Bridgecmd {:04x}", cmd.command),
            Self::SetDeviceList(list) => {
                f.write_str("ServerSetWrids")?;
                for device in &list.devices {
                    write!(f, " {}", device)?;
                }
                Ok(())
            }
            Self::DateSync(sync) => write!(
                f,
                "Serverdate {} [{:.2}kWh] remain {}",
                sync.time,
                sync.energy_kwh(),
                hex::encode(&sync.trailer)
            ),
            Self::Ack(ack) => write!(f, "Server ack {}", hex::encode(&ack.echo)),
            Self::TimeSync(sync) => write!(
                f,
                "Servertime(China) {} {:02x}({}) remain {} {}",
                sync.time,
                sync.variant,
                sync.variant,
                hex::encode(&sync.leading),
                hex::encode(&sync.trailer)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str.replace(' ', "")).unwrap()
    }

    #[test]
    fn test_bridge_command() {
        let data = frame(concat!(
            "680030681007 a1b2c3d4 00000000 0200 0010 0223 0002 1870 3021 28b8 1103 ",
            "00006a6e 1ee6 3a80 3204 000000000000 5816",
        ));
        let parsed = StatusFrame::parse(FrameKind::BridgeCommand, &data).unwrap();

        let StatusFrame::BridgeCommand(cmd) = &parsed else {
            panic!("expected bridge command, got {:?}", parsed);
        };
        assert_eq!(cmd.account.to_string(), "a1b2c3d4");
        assert_eq!(cmd.command, 0x1103);
        assert_eq!(cmd.status, 0x3021);
        assert_eq!(parsed.to_string(), "Bridgecmd 1103");
    }

    #[test]
    fn test_set_device_list_skips_empty_ids() {
        let data =
            frame("680020681009 a1b2c3d4 00000000 000000000000 12881870 00000000 12881871 0a16");
        let parsed = StatusFrame::parse(FrameKind::SetDeviceList, &data).unwrap();

        match parsed {
            StatusFrame::SetDeviceList(list) => {
                let ids: Vec<_> = list.devices.iter().map(ToString::to_string).collect();
                assert_eq!(ids, vec!["12881870", "12881871"]);
            }
            other => panic!("expected device list, got {:?}", other),
        }
    }

    #[test]
    fn test_date_sync() {
        let data =
            frame("680020681027 a1b2c3d4 00000345 0e1e0613 0000000000000000000000000000 ab16");
        let parsed = StatusFrame::parse(FrameKind::DateSync, &data).unwrap();

        let StatusFrame::DateSync(sync) = &parsed else {
            panic!("expected date sync");
        };
        assert_eq!(sync.power_counter, 0x345);
        assert_eq!(sync.time.hour, 14);
        assert_eq!(sync.time.day, 19);
        assert_eq!(
            parsed.to_string(),
            "Serverdate 19.06. 14:30 [8.37kWh] remain 0000000000000000000000000000"
        );
    }

    #[test]
    fn test_ack_echo() {
        let data = frame("680012681015 a1b2c3d4 1402070d 0000 a116");
        let parsed = StatusFrame::parse(FrameKind::Ack, &data).unwrap();
        assert_eq!(parsed.to_string(), "Server ack 1402070d0000");
        assert_eq!(parsed.account(), AccountId([0xa1, 0xb2, 0xc3, 0xd4]));
    }

    #[test]
    fn test_time_sync() {
        let data = frame("68001e681070 a1b2c3d4 00000000 7a 0613 0e1e05 00000000000000000000 cc16");
        let parsed = StatusFrame::parse(FrameKind::TimeSync, &data).unwrap();
        assert_eq!(parsed.kind(), FrameKind::TimeSync);
        assert_eq!(
            parsed.to_string(),
            "Servertime(China) 19.06. 14:30:05 7a(122) remain 00000000 00000000000000000000"
        );
    }

    #[test]
    fn test_truncated_and_wrong_kind() {
        let short = frame("680012681015 a1b2");
        assert_eq!(
            StatusFrame::parse(FrameKind::Ack, &short),
            Err(DecodeError::Truncated { kind: FrameKind::Ack, needed: 16, actual: 8 })
        );
        assert_eq!(
            StatusFrame::parse(FrameKind::Poll, &short),
            Err(DecodeError::NotStatus(FrameKind::Poll))
        );
    }
}
