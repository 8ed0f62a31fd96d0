//! APRS text decoding.
//!
//! Turns one `SOURCE>DEST,PATH...:BODY` line from the APRS-IS stream into a
//! [`Packet`]. Dispatch is on the body's data type identifier; the body
//! parsers live in the submodules.

mod message;
mod mic_e;
mod position;
mod weather;

use crate::packet::{BeaconReport, Header, Packet};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid header: {0}")]
    Header(&'static str),
    #[error("empty packet body")]
    EmptyBody,
    #[error("malformed {kind}: {detail}")]
    Malformed { kind: &'static str, detail: String },
    #[error("unsupported packet type {0:?}")]
    Unsupported(char),
}

impl DecodeError {
    pub(crate) fn malformed(kind: &'static str, detail: impl Into<String>) -> Self {
        DecodeError::Malformed {
            kind,
            detail: detail.into(),
        }
    }
}

/// Decode one line, resolving relative timestamps against the current time.
pub fn decode(line: &str) -> Result<Packet, DecodeError> {
    decode_at(line, Utc::now())
}

/// Decode one line, resolving relative timestamps against `now`.
pub fn decode_at(line: &str, now: DateTime<Utc>) -> Result<Packet, DecodeError> {
    let (header, body) = split_header(line)?;
    let dti = body.chars().next().ok_or(DecodeError::EmptyBody)?;
    let rest = &body[dti.len_utf8()..];

    match dti {
        '!' | '=' | '/' | '@' => position::decode_position(header, dti, rest, now),
        ';' => position::decode_object(header, rest, now),
        '_' => weather::decode_positionless(header, rest),
        '>' => Ok(message::decode_status(header, rest, now)),
        ':' => message::decode_message(header, rest),
        '`' | '\'' => mic_e::decode(header, rest),
        _ if is_beacon(&header) => Ok(Packet::Beacon(BeaconReport {
            header,
            text: Some(body.to_string()),
        })),
        other => Err(DecodeError::Unsupported(other)),
    }
}

fn is_beacon(header: &Header) -> bool {
    header
        .to
        .as_deref()
        .is_some_and(|to| to.eq_ignore_ascii_case("BEACON"))
}

fn split_header(line: &str) -> Result<(Header, &str), DecodeError> {
    let (head, body) = line.split_once(':').ok_or(DecodeError::Header("missing ':'"))?;
    let (from, route) = head.split_once('>').ok_or(DecodeError::Header("missing '>'"))?;
    if from.is_empty() {
        return Err(DecodeError::Header("empty source"));
    }

    let mut hops = route.split(',');
    let to = hops.next().unwrap_or_default();
    if to.is_empty() {
        return Err(DecodeError::Header("empty destination"));
    }
    let path: Vec<String> = hops.map(str::to_string).collect();
    let via = path
        .iter()
        .position(|hop| is_q_construct(hop))
        .and_then(|i| path.get(i + 1))
        .cloned();

    let header = Header {
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        via,
        path: Some(path),
        raw: Some(line.to_string()),
    };
    Ok((header, body))
}

/// `qAR`, `qAC`, `qAS`, ... as inserted by APRS-IS servers.
fn is_q_construct(hop: &str) -> bool {
    let bytes = hop.as_bytes();
    bytes.len() == 3 && bytes[0] == b'q' && bytes[1] == b'A' && bytes[2].is_ascii_alphabetic()
}

/// Base-91 digits as used by compressed positions and comment telemetry.
pub(crate) fn base91(digits: &str) -> Option<u32> {
    digits.bytes().try_fold(0u32, |acc, b| {
        if (b'!'..=b'{').contains(&b) {
            Some(acc * 91 + u32::from(b - 33))
        } else {
            None
        }
    })
}

/// Fixed-width ASCII slice, `None` when short or not on a char boundary.
pub(crate) fn take(s: &str, len: usize) -> Option<(&str, &str)> {
    Some((s.get(..len)?, s.get(len..)?))
}
