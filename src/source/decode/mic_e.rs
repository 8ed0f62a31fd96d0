//! Mic-E: latitude and message bits ride in the destination callsign,
//! longitude, speed, course and symbol in the first eight body bytes.

use super::{base91, DecodeError};
use crate::packet::{Header, MicEReport, Packet};

const KNOTS_TO_KMH: f64 = 1.852;

const STANDARD_TYPES: [(&str, &str); 8] = [
    ("111", "M0: Off Duty"),
    ("110", "M1: En Route"),
    ("101", "M2: In Service"),
    ("100", "M3: Returning"),
    ("011", "M4: Committed"),
    ("010", "M5: Special"),
    ("001", "M6: Priority"),
    ("000", "Emergency"),
];

const CUSTOM_TYPES: [(&str, &str); 8] = [
    ("111", "C0: Custom-0"),
    ("110", "C1: Custom-1"),
    ("101", "C2: Custom-2"),
    ("100", "C3: Custom-3"),
    ("011", "C4: Custom-4"),
    ("010", "C5: Custom-5"),
    ("001", "C6: Custom-6"),
    ("000", "Emergency"),
];

pub(super) fn decode(header: Header, body: &str) -> Result<Packet, DecodeError> {
    let to = header.to.as_deref().unwrap_or_default();
    let dest = to.split('-').next().unwrap_or(to);
    let malformed = |detail: &str| DecodeError::malformed("mic-e", detail.to_string());

    let d: [u8; 6] = dest
        .as_bytes()
        .try_into()
        .map_err(|_| malformed("destination must be six characters"))?;
    let digits = latitude_digits(&d).ok_or_else(|| malformed(dest))?;
    let posambiguity = ambiguity(&digits).ok_or_else(|| malformed(dest))?;

    let b = body.as_bytes();
    if b.len() < 8 || !b[..8].is_ascii() {
        return Err(malformed(body));
    }

    let mut latitude = latitude(&digits);
    if d[3] <= b'L' {
        latitude = -latitude;
    }

    let mut lon_deg = i32::from(b[0]) - 28;
    if d[4] >= b'P' {
        lon_deg += 100;
    }
    if (180..=189).contains(&lon_deg) {
        lon_deg -= 80;
    } else if (190..=199).contains(&lon_deg) {
        lon_deg -= 190;
    }
    let mut lon_min = f64::from(b[1]) - 28.0;
    if lon_min >= 60.0 {
        lon_min -= 60.0;
    }
    let lon_min = (lon_min * 100.0 + f64::from(b[2]) - 28.0) / 100.0;
    let mut longitude = f64::from(lon_deg) + lon_min / 60.0;
    if d[5] >= b'P' {
        longitude = -longitude;
    }

    let (sp, dc, se) = (
        i32::from(b[3]) - 28,
        i32::from(b[4]) - 28,
        i32::from(b[5]) - 28,
    );
    let mut speed = sp * 10 + dc / 10;
    let mut course = (dc % 10) * 100 + se;
    if speed >= 800 {
        speed -= 800;
    }
    if course >= 400 {
        course -= 400;
    }

    let mbits = message_bits(&d);
    let mtype = message_type(&mbits).map(str::to_string);

    let (altitude, comment) = split_altitude(&body[8..]);
    let (daodatumbyte, comment) = split_dao(&comment);

    Ok(Packet::MicE(MicEReport {
        header,
        latitude: Some(latitude),
        longitude: Some(longitude),
        posambiguity: Some(posambiguity),
        altitude,
        speed: Some(f64::from(speed) * KNOTS_TO_KMH),
        course: Some(f64::from(course)),
        mbits: Some(mbits),
        mtype,
        daodatumbyte,
        symbol: Some(char::from(b[6]).to_string()),
        symbol_table: Some(char::from(b[7]).to_string()),
        comment: Some(comment.trim().to_string()),
    }))
}

/// Destination characters to latitude digits, `b' '` marking ambiguity.
fn latitude_digits(d: &[u8; 6]) -> Option<[u8; 6]> {
    let mut digits = [0u8; 6];
    for (i, &c) in d.iter().enumerate() {
        digits[i] = match c {
            b'0'..=b'9' => c,
            b'A'..=b'J' if i < 3 => c - 17,
            b'P'..=b'Y' => c - 32,
            b'K' if i < 3 => b' ',
            b'L' | b'Z' => b' ',
            _ => return None,
        };
    }
    Some(digits)
}

/// Number of trailing ambiguity spaces; spaces must not precede digits.
fn ambiguity(digits: &[u8; 6]) -> Option<u8> {
    let spaces = digits.iter().rev().take_while(|&&c| c == b' ').count();
    if spaces == 6 || digits[..6 - spaces].contains(&b' ') {
        return None;
    }
    Some(spaces as u8)
}

fn latitude(digits: &[u8; 6]) -> f64 {
    let value = |range: std::ops::Range<usize>| {
        digits[range]
            .iter()
            .fold(0.0, |acc, &c| acc * 10.0 + f64::from(c.saturating_sub(b'0')))
    };
    let minutes = value(2..4) + value(4..6) / 100.0;
    value(0..2) + minutes / 60.0
}

fn message_bits(d: &[u8; 6]) -> String {
    d[..3]
        .iter()
        .map(|&c| match c {
            b'0'..=b'9' | b'L' => '0',
            b'P'..=b'Z' => '1',
            _ => '2',
        })
        .collect()
}

fn message_type(mbits: &str) -> Option<&'static str> {
    let (table, key) = if mbits.contains('2') {
        (&CUSTOM_TYPES, mbits.replace('2', "1"))
    } else {
        (&STANDARD_TYPES, mbits.to_string())
    };
    table
        .iter()
        .find(|(bits, _)| *bits == key)
        .map(|(_, name)| *name)
}

/// `xxx}` base-91 altitude, metres above -10000.
fn split_altitude(comment: &str) -> (Option<f64>, String) {
    let altitude = comment.find('}').filter(|&pos| pos >= 3).and_then(|pos| {
        let value = base91(comment.get(pos - 3..pos)?)?;
        Some((pos, f64::from(value) - 10000.0))
    });
    match altitude {
        Some((pos, metres)) => (
            Some(metres),
            format!("{}{}", &comment[..pos - 3], &comment[pos + 1..]),
        ),
        None => (None, comment.to_string()),
    }
}

/// `!DAO!` precision extension; only the datum byte is kept.
fn split_dao(comment: &str) -> (Option<String>, String) {
    let bytes = comment.as_bytes();
    let found = bytes.windows(5).position(|w| {
        w[0] == b'!'
            && w[4] == b'!'
            && (0x21..=0x7b).contains(&w[1])
            && w[2..4].iter().all(|c| (0x20..=0x7b).contains(c))
    });
    match found {
        Some(i) => (
            Some(char::from(bytes[i + 1]).to_ascii_uppercase().to_string()),
            format!("{}{}", &comment[..i], &comment[i + 5..]),
        ),
        None => (None, comment.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::decode::decode as decode_line;

    fn mic_e(line: &str) -> MicEReport {
        match decode_line(line).unwrap() {
            Packet::MicE(m) => m,
            other => panic!("expected mic-e, got {:?}", other),
        }
    }

    #[test]
    fn decodes_position_motion_and_altitude() {
        let m = mic_e("N0CALL>S32UPT,qAR,IGATE:`(#f(QO>/\"4T}hello");
        assert!((m.latitude.unwrap() - (33.0 + 25.04 / 60.0)).abs() < 1e-9);
        assert!((m.longitude.unwrap() + (112.0 + 7.74 / 60.0)).abs() < 1e-9);
        assert_eq!(m.posambiguity, Some(0));
        assert_eq!(m.speed, Some(125.0 * KNOTS_TO_KMH));
        assert_eq!(m.course, Some(351.0));
        assert_eq!(m.symbol.as_deref(), Some(">"));
        assert_eq!(m.symbol_table.as_deref(), Some("/"));
        assert_eq!(m.altitude, Some(61.0));
        assert_eq!(m.mbits.as_deref(), Some("100"));
        assert_eq!(m.mtype.as_deref(), Some("M3: Returning"));
        assert_eq!(m.comment.as_deref(), Some("hello"));
    }

    #[test]
    fn southern_hemisphere_and_ambiguity() {
        let m = mic_e("N0CALL>332LZZ:`(#f(QO>/");
        assert!(m.latitude.unwrap() < 0.0);
        assert_eq!(m.posambiguity, Some(3));
        assert_eq!(m.mbits.as_deref(), Some("000"));
        assert_eq!(m.mtype.as_deref(), Some("Emergency"));
    }

    #[test]
    fn custom_message_types() {
        assert_eq!(message_type("122"), Some("C0: Custom-0"));
        assert_eq!(message_type("102"), Some("C2: Custom-2"));
        assert_eq!(message_type("011"), Some("M4: Committed"));
    }

    #[test]
    fn dao_datum_is_extracted() {
        let (datum, rest) = split_dao("text !w5R! more");
        assert_eq!(datum.as_deref(), Some("W"));
        assert_eq!(rest, "text  more");
    }

    #[test]
    fn rejects_bad_destination() {
        assert!(decode_line("N0CALL>APRS:`(#f(QO>/").is_err());
        assert!(decode_line("N0CALL>S32UPT:`(#f").is_err());
    }
}
