//! Decoded APRS packets.
//!
//! A [`Packet`] is one message from the reporting network, discriminated by
//! its `format`. Field names follow the keys used by the packet source so a
//! packet serializes to (and deserializes from) the same JSON shape the
//! source produces, e.g. `{"format": "uncompressed", "from": "N0CALL", ...}`.

mod format;

pub use format::PacketFormat;

use serde::{Deserialize, Serialize};

/// One decoded packet, tagged by its format discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum Packet {
    #[serde(rename = "uncompressed")]
    Uncompressed(PositionReport),
    #[serde(rename = "mic-e")]
    MicE(MicEReport),
    #[serde(rename = "object")]
    Object(ObjectReport),
    #[serde(rename = "status")]
    Status(StatusReport),
    #[serde(rename = "compressed")]
    Compressed(PositionReport),
    #[serde(rename = "wx")]
    Wx(WeatherReport),
    #[serde(rename = "beacon")]
    Beacon(BeaconReport),
    #[serde(rename = "bulletin")]
    Bulletin(BulletinReport),
    #[serde(rename = "message")]
    Message(MessageReport),
    #[serde(rename = "telemetry-message")]
    TelemetryMessage(TelemetryMessageReport),
    /// Any format the translator has no table for.
    #[serde(other)]
    Unsupported,
}

impl Packet {
    pub fn format(&self) -> PacketFormat {
        match self {
            Packet::Uncompressed(_) => PacketFormat::Uncompressed,
            Packet::MicE(_) => PacketFormat::MicE,
            Packet::Object(_) => PacketFormat::Object,
            Packet::Status(_) => PacketFormat::Status,
            Packet::Compressed(_) => PacketFormat::Compressed,
            Packet::Wx(_) => PacketFormat::Wx,
            Packet::Beacon(_) => PacketFormat::Beacon,
            Packet::Bulletin(_) => PacketFormat::Bulletin,
            Packet::Message(_) => PacketFormat::Message,
            Packet::TelemetryMessage(_) => PacketFormat::TelemetryMessage,
            Packet::Unsupported => PacketFormat::Unsupported,
        }
    }

    /// Common station header, absent for unsupported packets.
    pub fn header(&self) -> Option<&Header> {
        match self {
            Packet::Uncompressed(p) | Packet::Compressed(p) => Some(&p.header),
            Packet::MicE(p) => Some(&p.header),
            Packet::Object(p) => Some(&p.header),
            Packet::Status(p) => Some(&p.header),
            Packet::Wx(p) => Some(&p.header),
            Packet::Beacon(p) => Some(&p.header),
            Packet::Bulletin(p) => Some(&p.header),
            Packet::Message(p) => Some(&p.header),
            Packet::TelemetryMessage(p) => Some(&p.header),
            Packet::Unsupported => None,
        }
    }

    /// Originating station, used as the telemetry scaling key.
    pub fn station(&self) -> Option<&str> {
        self.header().and_then(|h| h.from.as_deref())
    }
}

/// Addressing shared by every format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Hop following the `qA?` construct, i.e. the igate that heard the packet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Uncompressed and compressed position reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posambiguity: Option<u8>,
    /// Metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// km/h.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpsfixstatus: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messagecapable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phg: Option<String>,
    /// km.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicEReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posambiguity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    /// Three message bits as a string of `0`/`1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daodatumbyte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posambiguity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daodatumbyte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
}

/// Positionless weather report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wx_raw_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulletinReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_text: Option<String>,
    #[serde(rename = "msgNo", default, skip_serializing_if = "Option::is_none")]
    pub msg_no: Option<String>,
    /// `ack` or `rej`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Telemetry definition message (`PARM.`, `UNIT.`, `EQNS.`, `BITS.`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessageReport {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresse: Option<String>,
    /// Per-channel `[a, b, c]` scaling coefficients.
    #[serde(rename = "tEQNS", default, skip_serializing_if = "Option::is_none")]
    pub t_eqns: Option<Vec<Vec<f64>>>,
    #[serde(rename = "tPARM", default, skip_serializing_if = "Option::is_none")]
    pub t_parm: Option<Vec<String>>,
    #[serde(rename = "tUNIT", default, skip_serializing_if = "Option::is_none")]
    pub t_unit: Option<Vec<String>>,
    #[serde(rename = "tBITS", default, skip_serializing_if = "Option::is_none")]
    pub t_bits: Option<String>,
}

/// Raw telemetry carried in a packet comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<u8>,
    /// Raw analog readings, five expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vals: Option<Vec<f64>>,
}

/// Weather readings in metric units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_1h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_since_midnight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
}

impl Weather {
    /// Readings in the fixed output order.
    pub fn readings(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("rain_1h", self.rain_1h),
            ("rain_24h", self.rain_24h),
            ("rain_since_midnight", self.rain_since_midnight),
            ("temperature", self.temperature),
            ("wind_direction", self.wind_direction),
            ("wind_gust", self.wind_gust),
            ("wind_speed", self.wind_speed),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.readings().iter().all(|(_, v)| v.is_none())
    }
}
