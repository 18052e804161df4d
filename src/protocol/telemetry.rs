//! Monitoring payload decoding
//!
//! A monitoring payload carries a 20-byte header, a run of 32-byte slots
//! and a 2-byte trailer. Slot layout (big-endian):
//!
//! ```text
//! 0        4    6    8    10       14   16   18   20           32
//! wrid     stat dc   pwr  totalkWh temp ac   freq remaining
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use super::frame::FrameKind;
use super::DecodeError;

/// Size of one telemetry slot
pub const SLOT_LEN: usize = 32;

/// Bytes before the first slot
pub const MONITORING_HEADER_LEN: usize = 20;

/// Bytes after the last slot
pub const MONITORING_FOOTER_LEN: usize = 2;

/// Status of an inverter delivering a full reading
pub const STATUS_ONLINE: u16 = 0x3021;

/// Device (inverter) identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(pub [u8; 4]);

impl DeviceId {
    /// All-zero id terminating a slot list
    pub const SENTINEL: DeviceId = DeviceId([0; 4]);

    /// Read an id from the first four bytes of `data`
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes = data.get(..4)?;
        let mut id = [0u8; 4];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    /// Whether this is the list terminator
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.to_hex())
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Fixed-point scale of a raw field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    divisor: f64,
    offset: f64,
}

impl Scale {
    /// Create a scale `raw / divisor + offset`
    pub const fn new(divisor: f64, offset: f64) -> Self {
        Self { divisor, offset }
    }

    /// Physical value of a raw field
    pub fn apply(&self, raw: u32) -> f64 {
        f64::from(raw) / self.divisor + self.offset
    }

    /// Raw field closest to a physical value
    pub fn invert(&self, value: f64) -> u32 {
        ((value - self.offset) * self.divisor).round().max(0.0) as u32
    }
}

/// DC input voltage in V
pub const DC_VOLTAGE: Scale = Scale::new(512.0, 0.0);
/// AC output power in W
pub const AC_POWER: Scale = Scale::new(64.0, 0.0);
/// Lifetime energy in kWh
pub const TOTAL_ENERGY: Scale = Scale::new(8192.0, 0.0);
/// Inverter temperature in °C
pub const TEMPERATURE: Scale = Scale::new(128.0, -40.0);
/// AC grid voltage in V
pub const AC_VOLTAGE: Scale = Scale::new(64.0, 0.0);
/// Grid frequency in Hz
pub const FREQUENCY: Scale = Scale::new(256.0, 0.0);

/// Values only reported while the inverter is online
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerReading {
    /// DC input voltage (V)
    pub dc_voltage: f64,
    /// AC power (W)
    pub power: f64,
    /// Cumulative energy (kWh)
    pub total_energy: f64,
    /// Temperature (°C)
    pub temperature: f64,
}

/// One decoded telemetry slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Inverter id
    pub device_id: DeviceId,
    /// Raw status word
    pub status: u16,
    /// Full reading, present when `status` is [`STATUS_ONLINE`]
    pub reading: Option<PowerReading>,
    /// AC voltage (V)
    pub ac_voltage: f64,
    /// Grid frequency (Hz)
    pub frequency: f64,
    /// Undecoded tail of the slot
    #[serde(serialize_with = "serialize_hex")]
    pub remaining: [u8; 12],
}

fn serialize_hex<S: Serializer>(
    bytes: &[u8; 12],
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

impl TelemetryRecord {
    /// Decode one slot
    ///
    /// Returns `None` when the slot is shorter than [`SLOT_LEN`] or carries
    /// the sentinel id.
    pub fn from_slot(slot: &[u8]) -> Option<Self> {
        if slot.len() < SLOT_LEN {
            return None;
        }
        let device_id = DeviceId::from_slice(slot)?;
        if device_id.is_sentinel() {
            return None;
        }

        let status = be_u16(slot, 4);
        let reading = (status == STATUS_ONLINE).then(|| PowerReading {
            dc_voltage: DC_VOLTAGE.apply(u32::from(be_u16(slot, 6))),
            power: AC_POWER.apply(u32::from(be_u16(slot, 8))),
            total_energy: TOTAL_ENERGY.apply(be_u32(slot, 10)),
            temperature: TEMPERATURE.apply(u32::from(be_u16(slot, 14))),
        });

        let mut remaining = [0u8; 12];
        remaining.copy_from_slice(&slot[20..SLOT_LEN]);

        Some(Self {
            device_id,
            status,
            reading,
            ac_voltage: AC_VOLTAGE.apply(u32::from(be_u16(slot, 16))),
            frequency: FREQUENCY.apply(u32::from(be_u16(slot, 18))),
            remaining,
        })
    }

    /// Whether the inverter reported a full reading
    pub fn is_online(&self) -> bool {
        self.reading.is_some()
    }

    /// Flat key/value view, values rendered with two decimals
    ///
    /// Keys follow the topic names used by home-automation consumers:
    /// `wrid`, `status`, `dc`, `power`, `totalkwh`, `temp`, `ac`, `freq`,
    /// `remaining`.
    pub fn values(&self) -> Vec<(&'static str, String)> {
        let mut values = vec![
            ("wrid", self.device_id.to_hex()),
            ("status", format!("{:04x}", self.status)),
        ];
        if let Some(reading) = &self.reading {
            values.push(("dc", format!("{:.2}", reading.dc_voltage)));
            values.push(("power", format!("{:.2}", reading.power)));
            values.push(("totalkwh", format!("{:.2}", reading.total_energy)));
            values.push(("temp", format!("{:.2}", reading.temperature)));
        }
        values.push(("ac", format!("{:.2}", self.ac_voltage)));
        values.push(("freq", format!("{:.2}", self.frequency)));
        values.push(("remaining", hex::encode(self.remaining)));
        values
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.values() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

/// Decode consecutive slots until the sentinel or the end of `body`
///
/// A trailing partial slot is ignored.
pub fn decode_slots(body: &[u8]) -> Vec<TelemetryRecord> {
    body.chunks_exact(SLOT_LEN)
        .map_while(TelemetryRecord::from_slot)
        .collect()
}

/// Slot area of a monitoring payload (header and trailer stripped)
pub fn monitoring_body(frame: &[u8]) -> Result<&[u8], DecodeError> {
    let kind = FrameKind::MonitoringPayload;
    if frame.len() < kind.min_len() {
        return Err(DecodeError::Truncated {
            kind,
            needed: kind.min_len(),
            actual: frame.len(),
        });
    }
    Ok(&frame[MONITORING_HEADER_LEN..frame.len() - MONITORING_FOOTER_LEN])
}

/// Decode every record of a monitoring payload
pub fn decode_monitoring(frame: &[u8]) -> Result<Vec<TelemetryRecord>, DecodeError> {
    monitoring_body(frame).map(decode_slots)
}

/// Number of all-zero slots at the end of a monitoring payload
pub fn trailing_empty_slots(frame: &[u8]) -> usize {
    monitoring_body(frame)
        .map(|body| {
            body.rchunks_exact(SLOT_LEN)
                .take_while(|slot| slot.iter().all(|b| *b == 0))
                .count()
        })
        .unwrap_or(0)
}
