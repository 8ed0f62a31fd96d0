//! Packet → line protocol translation.
//!
//! Each record-producing format has a fixed field table: numeric attributes,
//! then quoted text attributes, then `path`, free text, `raw`, symbol, then
//! telemetry and weather. Every record carries the single tag
//! `format=<discriminant>`; the station stays a field to keep tag
//! cardinality bounded.

mod line;
mod scaling;

pub use line::{escape, join_path, FieldValue, LineRecord, MEASUREMENT};
pub use scaling::{ScalingEquation, ScalingSet, TelemetryScalingStore, CHANNELS};

use crate::log::Logger;
use crate::packet::{
    BeaconReport, BulletinReport, MessageReport, MicEReport, ObjectReport, Packet,
    PositionReport, StatusReport, Telemetry, TelemetryMessageReport, Weather, WeatherReport,
};
use crate::{log_debug, log_error};
use std::sync::Arc;

const ANALOG_KEYS: [&str; CHANNELS] = ["analog1", "analog2", "analog3", "analog4", "analog5"];

/// Per-packet failures. The packet is dropped; the stream continues.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TranslateError {
    #[error("telemetry carries {0} analog values, expected 5")]
    ShortTelemetry(usize),
    #[error("tEQNS carries {0} equations, expected 5")]
    EquationCount(usize),
    #[error("tEQNS channel {channel} has {len} coefficients, expected 3")]
    EquationArity { channel: usize, len: usize },
    #[error("field {field} is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

/// Turns packets into line records, holding telemetry calibration state.
pub struct PacketTranslator {
    scaling: TelemetryScalingStore,
    logger: Arc<dyn Logger>,
}

impl PacketTranslator {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            scaling: TelemetryScalingStore::new(),
            logger,
        }
    }

    pub fn scaling(&self) -> &TelemetryScalingStore {
        &self.scaling
    }

    /// Translate one packet. Errors are logged with the packet and yield `None`.
    pub fn translate(&mut self, packet: &Packet) -> Option<LineRecord> {
        match self.try_translate(packet) {
            Ok(Some(record)) if record.has_fields() => Some(record),
            Ok(Some(_)) => {
                log_debug!(self.logger, "dropping {} packet with no fields", packet.format());
                None
            }
            Ok(None) => None,
            Err(e) => {
                log_error!(self.logger, "{}", e);
                log_error!(self.logger, "Packet: {:?}", packet);
                None
            }
        }
    }

    /// Dispatch on format. `Ok(None)` means the format produces no record.
    pub fn try_translate(&mut self, packet: &Packet) -> Result<Option<LineRecord>, TranslateError> {
        let mut record = LineRecord::new(MEASUREMENT);
        record.tag("format", packet.format().name());

        match packet {
            Packet::Uncompressed(p) => self.uncompressed(p, &mut record)?,
            Packet::MicE(p) => mic_e(p, &mut record)?,
            Packet::Object(p) => self.object(p, &mut record)?,
            Packet::Status(p) => self.status(p, &mut record)?,
            Packet::Compressed(p) => self.compressed(p, &mut record)?,
            Packet::Wx(p) => wx(p, &mut record),
            Packet::Beacon(p) => beacon(p, &mut record),
            Packet::Bulletin(p) => bulletin(p, &mut record),
            Packet::Message(p) => message(p, &mut record),
            Packet::TelemetryMessage(p) => {
                self.telemetry_scaling(p)?;
                return Ok(None);
            }
            Packet::Unsupported => {
                log_debug!(self.logger, "Not parsing unsupported packet");
                return Ok(None);
            }
        }

        Ok(Some(record))
    }

    fn uncompressed(&self, p: &PositionReport, r: &mut LineRecord) -> Result<(), TranslateError> {
        r.float("latitude", p.latitude)
            .float("longitude", p.longitude)
            .integer("posambiguity", p.posambiguity.map(i64::from))
            .float("altitude", p.altitude)
            .float("speed", p.speed)
            .float("course", p.course);

        r.text("from", p.header.from.as_deref())
            .text("to", p.header.to.as_deref())
            .boolean("messagecapable", p.messagecapable)
            .text("phg", p.phg.as_deref())
            .text("rng", p.rng.map(|v| v.to_string()).as_deref())
            .text("via", p.header.via.as_deref());

        r.path(p.header.path.as_deref())
            .free_text("comment", p.comment.as_deref())
            .free_text("raw", p.header.raw.as_deref())
            .free_text("symbol", p.symbol.as_deref())
            .free_text("symbol_table", p.symbol_table.as_deref())
            .free_text("raw_timestamp", p.raw_timestamp.as_deref());

        self.telemetry(p.header.from.as_deref(), p.telemetry.as_ref(), r)?;
        weather(p.weather.as_ref(), r);
        Ok(())
    }

    fn compressed(&self, p: &PositionReport, r: &mut LineRecord) -> Result<(), TranslateError> {
        r.float("latitude", p.latitude)
            .float("longitude", p.longitude)
            .integer("gpsfixstatus", p.gpsfixstatus.map(i64::from))
            .float("altitude", p.altitude)
            .float("speed", p.speed)
            .float("course", p.course)
            .integer("timestamp", p.timestamp);

        r.text("from", p.header.from.as_deref())
            .text("to", p.header.to.as_deref())
            .boolean("messagecapable", p.messagecapable)
            .text("phg", p.phg.as_deref())
            .text("via", p.header.via.as_deref());

        r.path(p.header.path.as_deref())
            .free_text("comment", p.comment.as_deref())
            .free_text("raw", p.header.raw.as_deref())
            .free_text("symbol", p.symbol.as_deref())
            .free_text("symbol_table", p.symbol_table.as_deref());

        self.telemetry(p.header.from.as_deref(), p.telemetry.as_ref(), r)?;
        weather(p.weather.as_ref(), r);
        Ok(())
    }

    fn object(&self, p: &ObjectReport, r: &mut LineRecord) -> Result<(), TranslateError> {
        r.float("latitude", p.latitude)
            .float("longitude", p.longitude)
            .integer("posambiguity", p.posambiguity.map(i64::from))
            .float("speed", p.speed)
            .float("course", p.course)
            .integer("timestamp", p.timestamp)
            .float("altitude", p.altitude);

        r.text("from", p.header.from.as_deref())
            .boolean("alive", p.alive)
            .text("via", p.header.via.as_deref())
            .text("to", p.header.to.as_deref())
            .text("object_format", p.object_format.as_deref())
            .text("object_name", p.object_name.as_deref())
            .text("rng", p.rng.map(|v| v.to_string()).as_deref())
            .text("daodatumbyte", p.daodatumbyte.as_deref());

        r.path(p.header.path.as_deref())
            .free_text("comment", p.comment.as_deref())
            .free_text("raw", p.header.raw.as_deref())
            .free_text("symbol", p.symbol.as_deref())
            .free_text("symbol_table", p.symbol_table.as_deref())
            .free_text("raw_timestamp", p.raw_timestamp.as_deref());

        self.telemetry(p.header.from.as_deref(), p.telemetry.as_ref(), r)
    }

    fn status(&self, p: &StatusReport, r: &mut LineRecord) -> Result<(), TranslateError> {
        r.integer("timestamp", p.timestamp);

        r.text("from", p.header.from.as_deref())
            .text("via", p.header.via.as_deref())
            .text("to", p.header.to.as_deref());

        r.path(p.header.path.as_deref())
            .free_text("status", p.status.as_deref())
            .free_text("raw", p.header.raw.as_deref())
            .free_text("raw_timestamp", p.raw_timestamp.as_deref());

        self.telemetry(p.header.from.as_deref(), p.telemetry.as_ref(), r)
    }

    /// `seq`, `bits` and calibrated `analog1..5`.
    fn telemetry(
        &self,
        station: Option<&str>,
        telemetry: Option<&Telemetry>,
        r: &mut LineRecord,
    ) -> Result<(), TranslateError> {
        let Some(telemetry) = telemetry else {
            return Ok(());
        };

        r.integer("seq", telemetry.seq.map(i64::from))
            .integer("bits", telemetry.bits.map(i64::from));

        if let Some(vals) = &telemetry.vals {
            if vals.len() < CHANNELS {
                return Err(TranslateError::ShortTelemetry(vals.len()));
            }
            for (channel, raw) in vals.iter().take(CHANNELS).enumerate() {
                let value = self.scaling.scale(station, channel, *raw);
                r.float(ANALOG_KEYS[channel], Some(value));
            }
        }
        Ok(())
    }

    /// Stores `tEQNS` for the sending station. Produces no record.
    fn telemetry_scaling(&mut self, p: &TelemetryMessageReport) -> Result<(), TranslateError> {
        let Some(eqns) = &p.t_eqns else {
            return Ok(());
        };
        let Some(station) = p.header.from.as_deref() else {
            log_debug!(self.logger, "ignoring tEQNS without a sending station");
            return Ok(());
        };

        let set = parse_equations(eqns)?;
        log_debug!(self.logger, "updated telemetry scaling for {}", station);
        self.scaling.update(station, set);
        Ok(())
    }
}

fn parse_equations(eqns: &[Vec<f64>]) -> Result<ScalingSet, TranslateError> {
    if eqns.len() != CHANNELS {
        return Err(TranslateError::EquationCount(eqns.len()));
    }
    let mut set = [ScalingEquation::IDENTITY; CHANNELS];
    for (channel, coefficients) in eqns.iter().enumerate() {
        match coefficients.as_slice() {
            [a, b, c] => set[channel] = ScalingEquation::new(*a, *b, *c),
            other => {
                return Err(TranslateError::EquationArity {
                    channel,
                    len: other.len(),
                })
            }
        }
    }
    Ok(set)
}

fn weather(weather: Option<&Weather>, r: &mut LineRecord) {
    if let Some(weather) = weather {
        for (key, value) in weather.readings() {
            r.float(key, value);
        }
    }
}

fn mic_e(p: &MicEReport, r: &mut LineRecord) -> Result<(), TranslateError> {
    let mbits = p
        .mbits
        .as_deref()
        .map(|bits| {
            bits.parse::<i64>().map_err(|_| TranslateError::NotNumeric {
                field: "mbits",
                value: bits.to_string(),
            })
        })
        .transpose()?;

    r.float("latitude", p.latitude)
        .float("longitude", p.longitude)
        .integer("posambiguity", p.posambiguity.map(i64::from))
        .float("altitude", p.altitude)
        .float("speed", p.speed)
        .float("course", p.course)
        .integer("mbits", mbits);

    r.text("from", p.header.from.as_deref())
        .text("via", p.header.via.as_deref())
        .text("to", p.header.to.as_deref())
        .text("mtype", p.mtype.as_deref())
        .text("daodatumbyte", p.daodatumbyte.as_deref());

    r.path(p.header.path.as_deref())
        .free_text("comment", p.comment.as_deref())
        .free_text("raw", p.header.raw.as_deref())
        .free_text("symbol", p.symbol.as_deref())
        .free_text("symbol_table", p.symbol_table.as_deref());
    Ok(())
}

fn wx(p: &WeatherReport, r: &mut LineRecord) {
    r.text("from", p.header.from.as_deref())
        .text("to", p.header.to.as_deref())
        .text("via", p.header.via.as_deref());

    r.path(p.header.path.as_deref())
        .free_text("comment", p.comment.as_deref())
        .free_text("raw", p.header.raw.as_deref())
        .free_text("wx_raw_timestamp", p.wx_raw_timestamp.as_deref());

    weather(p.weather.as_ref(), r);
}

fn beacon(p: &BeaconReport, r: &mut LineRecord) {
    r.text("from", p.header.from.as_deref())
        .text("to", p.header.to.as_deref())
        .text("via", p.header.via.as_deref());

    r.path(p.header.path.as_deref())
        .free_text("text", p.text.as_deref())
        .free_text("raw", p.header.raw.as_deref());
}

fn bulletin(p: &BulletinReport, r: &mut LineRecord) {
    r.integer("bid", p.bid.map(i64::from));

    r.text("from", p.header.from.as_deref())
        .text("to", p.header.to.as_deref())
        .text("via", p.header.via.as_deref());

    r.path(p.header.path.as_deref())
        .free_text("message_text", p.message_text.as_deref())
        .free_text("identifier", p.identifier.as_deref())
        .free_text("raw", p.header.raw.as_deref());
}

fn message(p: &MessageReport, r: &mut LineRecord) {
    r.text("from", p.header.from.as_deref())
        .text("to", p.header.to.as_deref())
        .text("via", p.header.via.as_deref())
        .text("addresse", p.addresse.as_deref())
        .text("msgNo", p.msg_no.as_deref());

    r.path(p.header.path.as_deref())
        .free_text("message_text", p.message_text.as_deref())
        .free_text("response", p.response.as_deref())
        .free_text("raw", p.header.raw.as_deref());
}
