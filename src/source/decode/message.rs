//! Status reports and `:ADDRESSEE:text` messages.

use super::position::parse_timestamp;
use super::{take, DecodeError};
use crate::packet::{
    BulletinReport, Header, MessageReport, Packet, StatusReport, TelemetryMessageReport,
};
use chrono::{DateTime, Utc};

/// `>[DDHHMMz]text`
pub(super) fn decode_status(header: Header, body: &str, now: DateTime<Utc>) -> Packet {
    let stamped = take(body, 7).filter(|(stamp, _)| {
        stamp.ends_with('z') && stamp[..6].bytes().all(|b| b.is_ascii_digit())
    });

    let (raw_timestamp, status) = match stamped {
        Some((stamp, rest)) => (Some(stamp), rest),
        None => (None, body),
    };

    Packet::Status(StatusReport {
        header,
        status: Some(status.trim().to_string()),
        timestamp: raw_timestamp.and_then(|stamp| parse_timestamp(stamp, now)),
        raw_timestamp: raw_timestamp.map(str::to_string),
        telemetry: None,
    })
}

pub(super) fn decode_message(header: Header, body: &str) -> Result<Packet, DecodeError> {
    let (addressee, text) = take(body, 10)
        .filter(|(addressee, _)| addressee.ends_with(':'))
        .ok_or_else(|| DecodeError::malformed("message addressee", body))?;
    let addressee = addressee.trim_end_matches(':').trim_end();

    if let Some(bulletin) = addressee.strip_prefix("BLN") {
        return Ok(decode_bulletin(header, bulletin, text));
    }

    for (prefix, kind) in [
        ("PARM.", TelemetryDefinition::Parm),
        ("UNIT.", TelemetryDefinition::Unit),
        ("EQNS.", TelemetryDefinition::Eqns),
        ("BITS.", TelemetryDefinition::Bits),
    ] {
        if let Some(definition) = text.strip_prefix(prefix) {
            return decode_telemetry_definition(header, addressee, kind, definition);
        }
    }

    let mut report = MessageReport {
        header,
        addresse: Some(addressee.to_string()),
        ..Default::default()
    };

    if let Some((response, id)) = ack_or_rej(text) {
        report.response = Some(response.to_string());
        report.msg_no = Some(id.to_string());
        return Ok(Packet::Message(report));
    }

    match text.rsplit_once('{') {
        Some((message, id)) if !id.is_empty() => {
            // reply-ack ids look like `MM}AA`; keep the message's own number
            let id = id.split('}').next().unwrap_or(id);
            report.message_text = Some(message.trim().to_string());
            report.msg_no = Some(id.trim().to_string());
        }
        _ => report.message_text = Some(text.trim().to_string()),
    }
    Ok(Packet::Message(report))
}

fn ack_or_rej(text: &str) -> Option<(&'static str, &str)> {
    let (response, id) = if let Some(id) = text.strip_prefix("ack") {
        ("ack", id)
    } else {
        ("rej", text.strip_prefix("rej")?)
    };
    let id = id.trim_end();
    let valid = (1..=5).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'}');
    valid.then_some((response, id))
}

/// `BLN0`..`BLN9` carry a bulletin id; `BLNA`.. and named groups do not.
fn decode_bulletin(header: Header, name: &str, text: &str) -> Packet {
    let mut chars = name.chars();
    let bid = chars.next().and_then(|c| c.to_digit(10)).map(|d| d as u8);
    let identifier = if bid.is_some() { chars.as_str() } else { name };

    Packet::Bulletin(BulletinReport {
        header,
        bid,
        identifier: Some(identifier.trim().to_string()),
        message_text: Some(text.trim().to_string()),
    })
}

#[derive(Clone, Copy)]
enum TelemetryDefinition {
    Parm,
    Unit,
    Eqns,
    Bits,
}

fn decode_telemetry_definition(
    header: Header,
    addressee: &str,
    kind: TelemetryDefinition,
    body: &str,
) -> Result<Packet, DecodeError> {
    let mut report = TelemetryMessageReport {
        header,
        addresse: Some(addressee.to_string()),
        ..Default::default()
    };
    let list = |body: &str| -> Vec<String> {
        body.split(',').map(|s| s.trim().to_string()).collect()
    };

    match kind {
        TelemetryDefinition::Parm => report.t_parm = Some(list(body)),
        TelemetryDefinition::Unit => report.t_unit = Some(list(body)),
        TelemetryDefinition::Eqns => report.t_eqns = Some(parse_eqns(body)?),
        TelemetryDefinition::Bits => {
            let bits = body
                .get(..8)
                .filter(|bits| bits.bytes().all(|b| b == b'0' || b == b'1'))
                .ok_or_else(|| DecodeError::malformed("telemetry BITS", body))?;
            report.t_bits = Some(bits.to_string());
        }
    }
    Ok(Packet::TelemetryMessage(report))
}

/// Fifteen comma-separated coefficients; an empty slot keeps the identity
/// coefficient for its position.
fn parse_eqns(body: &str) -> Result<Vec<Vec<f64>>, DecodeError> {
    let values: Vec<&str> = body.trim_end().split(',').collect();
    if values.len() != 15 {
        return Err(DecodeError::malformed(
            "telemetry EQNS",
            format!("{} coefficients", values.len()),
        ));
    }

    let mut coefficients = [0.0, 1.0, 0.0].repeat(5);
    for (slot, value) in coefficients.iter_mut().zip(&values) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        *slot = value
            .parse()
            .map_err(|_| DecodeError::malformed("telemetry EQNS", value.to_string()))?;
    }
    Ok(coefficients.chunks(3).map(<[f64]>::to_vec).collect())
}
