//! Position reports and objects, plus the comment extensions they share.

use super::{base91, take, weather, DecodeError};
use crate::packet::{Header, ObjectReport, Packet, PositionReport, Telemetry};
use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};

const KNOTS_TO_KMH: f64 = 1.852;
const MILES_TO_KM: f64 = 1.609344;
const FEET_TO_METRES: f64 = 0.3048;

/// Coordinates and symbol, from either encoding.
#[derive(Debug, Default)]
pub(super) struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub symbol_table: char,
    pub symbol: char,
    pub compressed: bool,
    pub posambiguity: Option<u8>,
    pub gpsfixstatus: Option<u8>,
    pub altitude: Option<f64>,
    pub course: Option<f64>,
    pub speed: Option<f64>,
    pub range: Option<f64>,
}

/// Data found inside a free-text comment.
#[derive(Debug, Default, PartialEq)]
pub(super) struct Extensions {
    pub course: Option<f64>,
    pub speed: Option<f64>,
    pub phg: Option<String>,
    pub rng: Option<f64>,
    pub altitude: Option<f64>,
    pub telemetry: Option<Telemetry>,
    pub comment: String,
}

pub(super) fn decode_position(
    header: Header,
    dti: char,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Packet, DecodeError> {
    let (raw_timestamp, body) = if matches!(dti, '/' | '@') {
        let (stamp, rest) =
            take(body, 7).ok_or_else(|| DecodeError::malformed("timestamp", body))?;
        (Some(stamp), rest)
    } else {
        (None, body)
    };

    let (fix, comment) = parse_fix(body)?;
    let mut report = PositionReport {
        header,
        messagecapable: Some(matches!(dti, '=' | '@')),
        raw_timestamp: raw_timestamp.map(str::to_string),
        timestamp: raw_timestamp.and_then(|stamp| parse_timestamp(stamp, now)),
        ..Default::default()
    };
    let compressed = fix.compressed;
    apply_fix(&mut report, fix);

    if report.symbol.as_deref() == Some("_") {
        let (wx, rest) = weather::parse_weather(comment, true);
        report.weather = (!wx.is_empty()).then_some(wx);
        report.comment = Some(rest.trim().to_string());
    } else {
        let ext = parse_extensions(comment);
        report.course = report.course.or(ext.course);
        report.speed = report.speed.or(ext.speed);
        report.phg = ext.phg;
        report.rng = report.rng.or(ext.rng);
        report.altitude = report.altitude.or(ext.altitude);
        report.telemetry = ext.telemetry;
        report.comment = Some(ext.comment);
    }

    Ok(if compressed {
        Packet::Compressed(report)
    } else {
        Packet::Uncompressed(report)
    })
}

fn apply_fix(report: &mut PositionReport, fix: Fix) {
    report.latitude = Some(fix.latitude);
    report.longitude = Some(fix.longitude);
    report.posambiguity = fix.posambiguity;
    report.gpsfixstatus = fix.gpsfixstatus;
    report.altitude = fix.altitude;
    report.course = fix.course;
    report.speed = fix.speed;
    report.rng = fix.range;
    report.symbol = Some(fix.symbol.to_string());
    report.symbol_table = Some(fix.symbol_table.to_string());
}

/// `;NAME_____*DDHHMMz<position><comment>`
pub(super) fn decode_object(
    header: Header,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Packet, DecodeError> {
    let (name, body) = take(body, 9).ok_or_else(|| DecodeError::malformed("object", body))?;
    let (state, body) = take(body, 1).ok_or_else(|| DecodeError::malformed("object", name))?;
    let alive = match state {
        "*" => true,
        "_" => false,
        other => return Err(DecodeError::malformed("object state", other)),
    };
    let (stamp, body) =
        take(body, 7).ok_or_else(|| DecodeError::malformed("timestamp", body))?;
    let (fix, comment) = parse_fix(body)?;
    let ext = parse_extensions(comment);

    Ok(Packet::Object(ObjectReport {
        header,
        object_name: Some(name.trim_end().to_string()),
        object_format: Some(if fix.compressed { "compressed" } else { "uncompressed" }.into()),
        alive: Some(alive),
        latitude: Some(fix.latitude),
        longitude: Some(fix.longitude),
        posambiguity: fix.posambiguity,
        altitude: fix.altitude.or(ext.altitude),
        speed: fix.speed.or(ext.speed),
        course: fix.course.or(ext.course),
        rng: fix.range.or(ext.rng),
        daodatumbyte: None,
        symbol: Some(fix.symbol.to_string()),
        symbol_table: Some(fix.symbol_table.to_string()),
        comment: Some(ext.comment),
        timestamp: parse_timestamp(stamp, now),
        raw_timestamp: Some(stamp.to_string()),
        telemetry: ext.telemetry,
    }))
}

pub(super) fn parse_fix(body: &str) -> Result<(Fix, &str), DecodeError> {
    match body.bytes().next() {
        Some(b) if b.is_ascii_digit() => parse_uncompressed(body),
        Some(_) => parse_compressed(body),
        None => Err(DecodeError::malformed("position", "empty")),
    }
}

/// `DDMM.hhN/DDDMM.hhE#`, spaces in the minutes marking ambiguity.
fn parse_uncompressed(body: &str) -> Result<(Fix, &str), DecodeError> {
    let malformed = || DecodeError::malformed("uncompressed position", body);
    let (lat, rest) = take(body, 8).ok_or_else(malformed)?;
    let (table, rest) = take(rest, 1).ok_or_else(malformed)?;
    let (lon, rest) = take(rest, 9).ok_or_else(malformed)?;
    let (symbol, rest) = take(rest, 1).ok_or_else(malformed)?;
    if !lat.is_ascii() || !lon.is_ascii() {
        return Err(malformed());
    }

    let (lat_deg, lat_min, lat_dir) = (&lat[..2], &lat[2..7], &lat[7..]);
    let (lon_deg, lon_min, lon_dir) = (&lon[..3], &lon[3..8], &lon[8..]);
    if lat_min.as_bytes()[2] != b'.' || lon_min.as_bytes()[2] != b'.' {
        return Err(malformed());
    }

    let ambiguity = lat_min.bytes().filter(|b| *b == b' ').count();
    let degrees = |s: &str| s.parse::<u16>().map_err(|_| malformed());
    let minutes = |s: &str| -> Result<f64, DecodeError> {
        if ambiguity >= 4 {
            return Ok(30.0);
        }
        s.replacen(' ', "5", 1)
            .replace(' ', "0")
            .parse::<f64>()
            .map_err(|_| malformed())
    };

    let lat_deg = degrees(lat_deg)?;
    let lon_deg = degrees(lon_deg)?;
    if lat_deg > 89 || lon_deg > 179 {
        return Err(malformed());
    }

    let mut latitude = f64::from(lat_deg) + minutes(lat_min)? / 60.0;
    let mut longitude = f64::from(lon_deg) + minutes(lon_min)? / 60.0;
    match lat_dir {
        "N" => {}
        "S" => latitude = -latitude,
        _ => return Err(malformed()),
    }
    match lon_dir {
        "E" => {}
        "W" => longitude = -longitude,
        _ => return Err(malformed()),
    }

    let fix = Fix {
        latitude,
        longitude,
        symbol_table: first_char(table),
        symbol: first_char(symbol),
        posambiguity: Some(ambiguity as u8),
        ..Default::default()
    };
    Ok((fix, rest))
}

/// `TYYYYXXXX$csT`: base-91 lat/lon followed by course/speed, altitude or range.
fn parse_compressed(body: &str) -> Result<(Fix, &str), DecodeError> {
    let malformed = || DecodeError::malformed("compressed position", body);
    let (block, rest) = take(body, 13).ok_or_else(malformed)?;
    if !block.is_ascii() {
        return Err(malformed());
    }

    let lat = base91(&block[1..5]).ok_or_else(malformed)?;
    let lon = base91(&block[5..9]).ok_or_else(malformed)?;
    let cst = block.as_bytes();
    let (c, s, t) = (cst[10], cst[11], cst[12]);

    let mut fix = Fix {
        latitude: 90.0 - f64::from(lat) / 380926.0,
        longitude: -180.0 + f64::from(lon) / 190463.0,
        symbol_table: first_char(&block[..1]),
        symbol: first_char(&block[9..10]),
        compressed: true,
        ..Default::default()
    };

    if c != b' ' {
        let (c, s, t) = (
            i32::from(c) - 33,
            i32::from(s) - 33,
            i32::from(t) - 33,
        );
        fix.gpsfixstatus = Some(u8::from(t & 0x20 == 0x20));
        if t & 0x18 == 0x10 {
            fix.altitude = Some(1.002f64.powi(c * 91 + s) * FEET_TO_METRES);
        } else if (0..=89).contains(&c) {
            fix.course = Some(if c == 0 { 360.0 } else { f64::from(c * 4) });
            fix.speed = Some((1.08f64.powi(s) - 1.0) * KNOTS_TO_KMH);
        } else if c == 90 {
            fix.range = Some(2.0 * 1.08f64.powi(s) * MILES_TO_KM);
        }
    }
    Ok((fix, rest))
}

fn first_char(s: &str) -> char {
    s.chars().next().unwrap_or(' ')
}

/// Pulls `CSE/SPD`, `PHGphgd`, `RNGrrrr`, `/A=aaaaaa` and `|telemetry|` out of
/// a comment; whatever is left becomes the comment text.
pub(super) fn parse_extensions(comment: &str) -> Extensions {
    let mut ext = Extensions::default();
    let mut rest = comment.to_string();

    if let Some((course, speed)) = course_speed(&rest) {
        ext.course = course;
        ext.speed = speed;
        rest.drain(..7);
    } else if let Some(phg) = rest.strip_prefix("PHG").and_then(|s| s.get(..4)) {
        let b = phg.as_bytes();
        if b[0].is_ascii_digit()
            && (b'0'..=b'~').contains(&b[1])
            && b[2].is_ascii_digit()
            && b[3].is_ascii_digit()
        {
            ext.phg = Some(phg.to_string());
            rest.drain(..7);
        }
    } else if let Some(rng) = rest.strip_prefix("RNG").and_then(|s| s.get(..4)) {
        if let Ok(miles) = rng.parse::<u16>() {
            ext.rng = Some(f64::from(miles) * MILES_TO_KM);
            rest.drain(..7);
        }
    }

    if let Some((altitude, stripped)) = altitude(&rest) {
        ext.altitude = Some(altitude);
        rest = stripped;
    }
    if let Some((telemetry, stripped)) = comment_telemetry(&rest) {
        ext.telemetry = Some(telemetry);
        rest = stripped;
    }

    ext.comment = rest.trim().to_string();
    ext
}

fn course_speed(s: &str) -> Option<(Option<f64>, Option<f64>)> {
    let block = s.get(..7)?;
    let b = block.as_bytes();
    let ok = |x: &[u8]| x.iter().all(|c| c.is_ascii_digit() || *c == b' ' || *c == b'.');
    if b[3] != b'/' || !ok(&b[..3]) || !ok(&b[4..]) {
        return None;
    }

    let numeric = |x: &str| {
        if x.bytes().all(|c| c.is_ascii_digit()) && x != "000" {
            x.parse::<u16>().ok()
        } else {
            None
        }
    };
    let course = numeric(&block[..3]).map(|c| {
        if (1..=360).contains(&c) {
            f64::from(c)
        } else {
            0.0
        }
    });
    let speed = numeric(&block[4..]).map(|s| f64::from(s) * KNOTS_TO_KMH);
    Some((course, speed))
}

/// `/A=` followed by six digits or `-` and five digits, in feet.
fn altitude(s: &str) -> Option<(f64, String)> {
    let start = s.find("/A=")?;
    let digits = s.get(start + 3..start + 9)?;
    let valid = match digits.as_bytes() {
        [b'-', tail @ ..] => tail.iter().all(u8::is_ascii_digit),
        all => all.iter().all(u8::is_ascii_digit),
    };
    if !valid {
        return None;
    }
    let feet: i32 = digits.parse().ok()?;
    let stripped = format!("{}{}", &s[..start], &s[start + 9..]);
    Some((f64::from(feet) * FEET_TO_METRES, stripped))
}

/// `|ss1122334455bb|`: sequence, up to five values and an optional bits byte,
/// each two base-91 digits.
fn comment_telemetry(s: &str) -> Option<(Telemetry, String)> {
    let start = s.find('|')?;
    let len = s[start + 1..].find('|')?;
    let inner = &s[start + 1..start + 1 + len];
    if !(4..=14).contains(&len) || len % 2 != 0 {
        return None;
    }

    let mut pairs = Vec::with_capacity(7);
    for i in (0..len).step_by(2) {
        pairs.push(base91(inner.get(i..i + 2)?)?);
    }
    let mut vals = [0.0; 5];
    for (slot, value) in vals.iter_mut().zip(pairs.iter().skip(1)) {
        *slot = f64::from(*value);
    }

    let telemetry = Telemetry {
        seq: Some(pairs[0]),
        bits: pairs.get(6).map(|bits| (bits & 0xff) as u8),
        vals: Some(vals.to_vec()),
    };
    let stripped = format!("{}{}", &s[..start], &s[start + len + 2..]);
    Some((telemetry, stripped))
}

/// `DDHHMMz`, `DDHHMM/` (treated as UTC) or `HHMMSSh`, as Unix seconds.
pub(super) fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    let (digits, kind) = take(raw, 6)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let a: u32 = digits[..2].parse().ok()?;
    let b: u32 = digits[2..4].parse().ok()?;
    let c: u32 = digits[4..].parse().ok()?;

    match kind {
        "z" | "/" => Utc
            .with_ymd_and_hms(now.year(), now.month(), a, b, c, 0)
            .single()
            .map(|t| t.timestamp()),
        "h" => {
            let time = NaiveTime::from_hms_opt(a, b, c)?;
            Some(now.date_naive().and_time(time).and_utc().timestamp())
        }
        _ => None,
    }
}
