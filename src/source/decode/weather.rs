//! Weather data, either positionless (`_`) or trailing a `_`-symbol position.

use super::{take, DecodeError};
use crate::packet::{Header, Packet, Weather, WeatherReport};

const MPH_TO_MS: f64 = 0.44704;
const HUNDREDTHS_INCH_TO_MM: f64 = 0.254;

/// `_MMDDHHMMc220s004g005t077...`
pub(super) fn decode_positionless(header: Header, body: &str) -> Result<Packet, DecodeError> {
    let (stamp, rest) = take(body, 8)
        .filter(|(stamp, _)| stamp.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| DecodeError::malformed("weather timestamp", body))?;

    let (weather, comment) = parse_weather(rest, false);
    if weather.is_empty() {
        return Err(DecodeError::malformed("weather", rest));
    }

    Ok(Packet::Wx(WeatherReport {
        header,
        comment: Some(comment.trim().to_string()),
        wx_raw_timestamp: Some(stamp.to_string()),
        weather: Some(weather),
    }))
}

/// Reads weather fields from the front of `body`, returning what is left.
/// With `leading_wind`, a `ddd/sss` direction/speed block may come first.
pub(super) fn parse_weather(body: &str, leading_wind: bool) -> (Weather, String) {
    let mut wx = Weather::default();
    let mut rest = body;

    if leading_wind {
        if let Some(block) = rest.get(..7).filter(|b| b.is_ascii() && b.as_bytes()[3] == b'/') {
            wx.wind_direction = block[..3].parse().ok();
            wx.wind_speed = block[4..].parse::<f64>().ok().map(|mph| mph * MPH_TO_MS);
            rest = &rest[7..];
        }
    }

    while let Some(key) = rest.chars().next() {
        let width = match key {
            'c' | 's' | 'g' | 't' | 'r' | 'p' | 'P' | 'L' | 'l' | '#' => 3,
            'h' => 2,
            'b' => 5,
            _ => break,
        };
        let Some(value) = rest.get(1..1 + width) else {
            break;
        };
        let valid = value
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.' || b == b' ' || (key == 't' && b == b'-'));
        if !valid {
            break;
        }
        rest = &rest[1 + width..];

        // dots or spaces mean "no reading"
        let Ok(n) = value.parse::<f64>() else {
            continue;
        };
        match key {
            'c' => wx.wind_direction = Some(n),
            's' => wx.wind_speed = Some(n * MPH_TO_MS),
            'g' => wx.wind_gust = Some(n * MPH_TO_MS),
            't' => wx.temperature = Some((n - 32.0) / 1.8),
            'r' => wx.rain_1h = Some(n * HUNDREDTHS_INCH_TO_MM),
            'p' => wx.rain_24h = Some(n * HUNDREDTHS_INCH_TO_MM),
            'P' => wx.rain_since_midnight = Some(n * HUNDREDTHS_INCH_TO_MM),
            'h' => wx.humidity = Some(if n == 0.0 { 100.0 } else { n }),
            'b' => wx.pressure = Some(n / 10.0),
            _ => {}
        }
    }

    (wx, rest.to_string())
}
