//! Display formatting
//!
//! Pure functions turning raw frame fields into the text shown in the frame
//! table and in the filter forms.

use crate::types::AddressWidth;
use chrono::{DateTime, Local};

/// Placeholder shown when a timestamp cannot be represented
const INVALID_TIME: &str = "--:--:--.---";

/// Render an identifier as lowercase hex, 3 digits for 11-bit and 8 digits
/// for 29-bit addressing.
pub fn format_identifier(identifier: u32, width: AddressWidth) -> String {
    format!("{:0width$x}", identifier, width = width.hex_digits())
}

/// Render a mask or masking result: always 8 lowercase hex digits.
pub fn format_mask_value(value: u32) -> String {
    format!("{:08x}", value)
}

/// Render an identifier received as an integer from the device's filter
/// lists. Values up to 0x7FF keep the short form, even when they were
/// installed as 29-bit identifiers.
pub fn format_list_identifier(identifier: u32) -> String {
    if identifier > AddressWidth::Standard.max_identifier() {
        format_identifier(identifier, AddressWidth::Extended)
    } else {
        format_identifier(identifier, AddressWidth::Standard)
    }
}

/// Insert a space between byte pairs: `"0a1bff"` becomes `"0a 1b ff"`.
pub fn format_payload(payload_hex: &str) -> String {
    let digits: Vec<char> = payload_hex.chars().collect();
    digits
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render epoch seconds as local `HH:MM:SS.mmm`.
///
/// Milliseconds are truncated, never rounded, so `…0.1239` shows `.123`.
pub fn format_timestamp(timestamp_secs: f64) -> String {
    if !timestamp_secs.is_finite() {
        return INVALID_TIME.to_string();
    }

    let total_ms = (timestamp_secs * 1000.0).floor() as i64;
    let secs = total_ms.div_euclid(1000);
    let millis = total_ms.rem_euclid(1000);

    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => {
            let local = utc.with_timezone(&Local);
            format!("{}.{:03}", local.format("%H:%M:%S"), millis)
        }
        None => INVALID_TIME.to_string(),
    }
}

/// Render the data length code
pub fn format_dlc(data_length_code: u8) -> String {
    data_length_code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_padding() {
        assert_eq!(format_identifier(0x1, AddressWidth::Standard), "001");
        assert_eq!(format_identifier(0x7FF, AddressWidth::Standard), "7ff");
        assert_eq!(format_identifier(0x123, AddressWidth::Extended), "00000123");
        assert_eq!(format_identifier(0x1FFF_FFFF, AddressWidth::Extended), "1fffffff");
    }

    #[test]
    fn test_mask_value_always_eight_digits() {
        assert_eq!(format_mask_value(0), "00000000");
        assert_eq!(format_mask_value(0x7FF), "000007ff");
        assert_eq!(format_mask_value(0x1F00_FFFF), "1f00ffff");
    }

    #[test]
    fn test_list_identifier_rule() {
        assert_eq!(format_list_identifier(0x7FF), "7ff");
        assert_eq!(format_list_identifier(0x800), "00000800");
    }

    #[test]
    fn test_payload_spacing() {
        assert_eq!(format_payload("0a1bff"), "0a 1b ff");
        assert_eq!(format_payload("00"), "00");
        assert_eq!(format_payload(""), "");
    }

    #[test]
    fn test_timestamp_truncates_milliseconds() {
        let text = format_timestamp(1700000000.1234);
        let expected_clock = DateTime::from_timestamp(1700000000, 0)
            .unwrap()
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string();

        assert_eq!(text, format!("{}.123", expected_clock));
        assert_eq!(text.len(), "HH:MM:SS.mmm".len());
    }

    #[test]
    fn test_timestamp_pads_milliseconds() {
        assert!(format_timestamp(1700000000.0075).ends_with(".007"));
        assert!(format_timestamp(1700000000.0).ends_with(".000"));
    }

    #[test]
    fn test_non_finite_timestamp() {
        assert_eq!(format_timestamp(f64::NAN), INVALID_TIME);
    }
}
