//! Conversions between raw characteristic payloads and domain values.
//!
//! Everything in here is pure; all I/O and retry policy lives in
//! `device::connection` and `device::session`.

use crate::error::{DecodeError, EncodeError};

/// Temperatures travel over the wire as hundredths of a degree Celsius,
/// little-endian u16.
const TEMPERATURE_SCALE: f64 = 0.01;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Decodes a 2-byte temperature payload. The raw value is always Celsius;
/// when `use_metric` is false the result is converted to Fahrenheit.
/// Rounded to two decimal places either way.
pub fn decode_temperature(bytes: &[u8], use_metric: bool) -> Result<f64, DecodeError> {
    let raw: [u8; 2] = bytes
        .try_into()
        .map_err(|_| DecodeError::TemperatureLength(bytes.len()))?;

    let mut temp = f64::from(u16::from_le_bytes(raw)) * TEMPERATURE_SCALE;
    if !use_metric {
        temp = temp * 9.0 / 5.0 + 32.0;
    }

    Ok(round2(temp))
}

/// Encodes a Celsius temperature into the 2-byte wire format. Unit
/// conversion is the caller's job; this only scales and range-checks.
pub fn encode_temperature(celsius: f64) -> Result<[u8; 2], EncodeError> {
    let raw = (celsius / TEMPERATURE_SCALE).round();
    if !(0.0..=f64::from(u16::MAX)).contains(&raw) {
        return Err(EncodeError::TemperatureRange(celsius));
    }

    Ok((raw as u16).to_le_bytes())
}

/// First byte of the battery payload is the percentage.
pub fn decode_battery(bytes: &[u8]) -> Result<f64, DecodeError> {
    let percent = bytes.first().ok_or(DecodeError::BatteryEmpty)?;
    Ok(round2(f64::from(*percent)))
}

/// The LED payload is RGBA; the alpha byte is read but discarded.
pub fn decode_color(bytes: &[u8]) -> Result<(u8, u8, u8), DecodeError> {
    match bytes {
        [r, g, b, ..] => Ok((*r, *g, *b)),
        _ => Err(DecodeError::ColorLength(bytes.len())),
    }
}

pub fn format_color_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_metric_temperature() {
        assert_eq!(decode_temperature(&[0x64, 0x00], true).unwrap(), 1.00);
        assert_eq!(decode_temperature(&[0x7C, 0x15], true).unwrap(), 55.00);
    }

    #[test]
    fn decodes_imperial_temperature() {
        assert_eq!(decode_temperature(&[0x64, 0x00], false).unwrap(), 33.80);
    }

    #[test]
    fn rejects_bad_temperature_length() {
        assert_eq!(
            decode_temperature(&[0x64], true),
            Err(DecodeError::TemperatureLength(1)),
        );
        assert_eq!(
            decode_temperature(&[0x64, 0x00, 0x00], true),
            Err(DecodeError::TemperatureLength(3)),
        );
    }

    #[test]
    fn encode_decode_round_trips_under_celsius() {
        for raw in [0u16, 1, 100, 5500, 9999, u16::MAX] {
            let bytes = raw.to_le_bytes();
            let decoded = decode_temperature(&bytes, true).unwrap();
            let encoded = encode_temperature(decoded).unwrap();
            let redecoded = decode_temperature(&encoded, true).unwrap();
            assert!((redecoded - decoded).abs() < 0.01, "raw {}", raw);
        }
    }

    #[test]
    fn encode_rejects_out_of_range_values() {
        assert!(encode_temperature(-1.0).is_err());
        assert!(encode_temperature(656.0).is_err());
        assert_eq!(encode_temperature(55.0).unwrap(), [0x7C, 0x15]);
    }

    #[test]
    fn decodes_battery_from_first_byte() {
        assert_eq!(decode_battery(&[68, 1, 2]).unwrap(), 68.0);
        assert_eq!(decode_battery(&[]), Err(DecodeError::BatteryEmpty));
    }

    #[test]
    fn decodes_color_and_discards_alpha() {
        assert_eq!(decode_color(&[0xFF, 0x00, 0x80, 0x00]).unwrap(), (255, 0, 128));
        assert_eq!(decode_color(&[0xFF, 0x00, 0x80]).unwrap(), (255, 0, 128));
        assert_eq!(decode_color(&[0xFF, 0x00]), Err(DecodeError::ColorLength(2)));
    }

    #[test]
    fn formats_color_as_lowercase_hex() {
        assert_eq!(format_color_hex(255, 0, 128), "#ff0080");
        assert_eq!(format_color_hex(0, 0, 0), "#000000");
    }
}
