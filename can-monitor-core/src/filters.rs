//! Filter values exchanged with the capture device
//!
//! The device enforces an identifier whitelist, a blacklist, a mask pair and
//! an inactivity timeout. This module validates what the user types before it
//! is sent, and renders what the device reports back.

use crate::format;
use crate::types::{AddressWidth, MonitorError, Result};
use std::fmt;
use std::str::FromStr;

/// A validated CAN identifier as typed in a filter form.
///
/// Accepted forms are 3 hex digits from `000` to `7ff` (11-bit) or 8 hex
/// digits from `00000000` to `1fffffff` (29-bit), in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanIdentifier {
    value: u32,
    width: AddressWidth,
}

impl CanIdentifier {
    pub fn new(value: u32, width: AddressWidth) -> Result<Self> {
        if value > width.max_identifier() {
            return Err(MonitorError::InvalidIdentifier(format!("{:x}", value)));
        }
        Ok(Self { value, width })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> AddressWidth {
        self.width
    }

    /// Lowercase, zero-padded text as sent to the device
    pub fn to_hex(&self) -> String {
        format::format_identifier(self.value, self.width)
    }
}

impl FromStr for CanIdentifier {
    type Err = MonitorError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = || MonitorError::InvalidIdentifier(text.to_string());

        let width = match text.len() {
            3 => AddressWidth::Standard,
            8 => AddressWidth::Extended,
            _ => return Err(invalid()),
        };
        if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let value = u32::from_str_radix(text, 16).map_err(|_| invalid())?;
        if value > width.max_identifier() {
            return Err(invalid());
        }
        Ok(Self { value, width })
    }
}

impl fmt::Display for CanIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Ordered, duplicate-free list of identifiers being edited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierList {
    entries: Vec<CanIdentifier>,
}

impl IdentifierList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append an identifier
    pub fn add(&mut self, text: &str) -> Result<CanIdentifier> {
        let identifier: CanIdentifier = text.trim().parse()?;
        if self.entries.contains(&identifier) {
            return Err(MonitorError::DuplicateIdentifier(identifier.to_hex()));
        }
        self.entries.push(identifier);
        Ok(identifier)
    }

    pub fn remove(&mut self, text: &str) -> Result<CanIdentifier> {
        let identifier: CanIdentifier = text.trim().parse()?;
        match self.entries.iter().position(|entry| *entry == identifier) {
            Some(index) => Ok(self.entries.remove(index)),
            None => Err(MonitorError::UnknownIdentifier(identifier.to_hex())),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the list with the integers reported by the device.
    ///
    /// Values the device reports but the forms cannot express are skipped.
    pub fn replace_from_device(&mut self, identifiers: &[u32]) {
        self.entries.clear();
        for &identifier in identifiers {
            let text = format::format_list_identifier(identifier);
            if let Err(err) = self.add(&text) {
                log::warn!("Skipping identifier reported by device: {}", err);
            }
        }
    }

    pub fn to_hex_list(&self) -> Vec<String> {
        self.entries.iter().map(CanIdentifier::to_hex).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mask filter: the device admits `identifier & mask == masking_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskPair {
    pub mask: u32,
    pub masking_result: u32,
}

impl MaskPair {
    pub fn parse(mask: &str, masking_result: &str) -> Result<Self> {
        let mask: CanIdentifier = mask.trim().parse()?;
        let masking_result: CanIdentifier = masking_result.trim().parse()?;
        Ok(Self {
            mask: mask.value(),
            masking_result: masking_result.value(),
        })
    }

    /// Interpret the pair reported by the device; `(0, 0)` means no mask
    pub fn from_device(mask: u32, masking_result: u32) -> Option<Self> {
        if mask == 0 && masking_result == 0 {
            None
        } else {
            Some(Self { mask, masking_result })
        }
    }

    pub fn mask_text(&self) -> String {
        format::format_mask_value(self.mask)
    }

    pub fn masking_result_text(&self) -> String {
        format::format_mask_value(self.masking_result)
    }
}

/// Seconds of bus silence after which the device restarts monitoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InactivityTimeout(f64);

impl InactivityTimeout {
    pub fn new(seconds: f64) -> Result<Self> {
        if seconds.is_finite() && seconds > 0.0 {
            Ok(Self(seconds))
        } else {
            Err(MonitorError::InvalidTimeout(seconds.to_string()))
        }
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }
}

impl FromStr for InactivityTimeout {
    type Err = MonitorError;

    fn from_str(text: &str) -> Result<Self> {
        let seconds: f64 = text
            .trim()
            .parse()
            .map_err(|_| MonitorError::InvalidTimeout(text.to_string()))?;
        Self::new(seconds)
    }
}

impl fmt::Display for InactivityTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!("7ff".parse::<CanIdentifier>().is_ok());
        assert!("7FF".parse::<CanIdentifier>().is_ok());
        assert!("000".parse::<CanIdentifier>().is_ok());
        assert!("1fffffff".parse::<CanIdentifier>().is_ok());
        assert!("00000000".parse::<CanIdentifier>().is_ok());

        assert!("800".parse::<CanIdentifier>().is_err());
        assert!("2fffffff".parse::<CanIdentifier>().is_err());
        assert!("7f".parse::<CanIdentifier>().is_err());
        assert!("0007ff".parse::<CanIdentifier>().is_err());
        assert!("+7f".parse::<CanIdentifier>().is_err());
        assert!("xyz".parse::<CanIdentifier>().is_err());
        assert!("".parse::<CanIdentifier>().is_err());
    }

    #[test]
    fn test_identifier_width_from_length() {
        let short: CanIdentifier = "123".parse().unwrap();
        let long: CanIdentifier = "00000123".parse().unwrap();
        assert_eq!(short.width(), AddressWidth::Standard);
        assert_eq!(long.width(), AddressWidth::Extended);
        assert_eq!(short.value(), long.value());
        assert_ne!(short, long);
        assert_eq!("ABC".parse::<CanIdentifier>().unwrap().to_hex(), "abc");
    }

    #[test]
    fn test_identifier_new_checks_range() {
        assert!(CanIdentifier::new(0x7FF, AddressWidth::Standard).is_ok());
        assert!(CanIdentifier::new(0x800, AddressWidth::Standard).is_err());
    }

    #[test]
    fn test_list_rejects_invalid_and_duplicates() {
        let mut list = IdentifierList::new();
        list.add("123").unwrap();
        list.add("00000456").unwrap();

        assert!(matches!(list.add("123"), Err(MonitorError::DuplicateIdentifier(_))));
        assert!(matches!(list.add("1A3"), Ok(_)));
        assert!(matches!(list.add("1a3"), Err(MonitorError::DuplicateIdentifier(_))));
        assert!(matches!(list.add("900"), Err(MonitorError::InvalidIdentifier(_))));
        assert_eq!(list.to_hex_list(), vec!["123", "00000456", "1a3"]);
    }

    #[test]
    fn test_list_remove() {
        let mut list = IdentifierList::new();
        list.add("001").unwrap();
        list.add("002").unwrap();
        list.remove("001").unwrap();
        assert_eq!(list.to_hex_list(), vec!["002"]);
        assert!(matches!(list.remove("003"), Err(MonitorError::UnknownIdentifier(_))));
    }

    #[test]
    fn test_list_reload_from_device() {
        let mut list = IdentifierList::new();
        list.add("555").unwrap();
        list.replace_from_device(&[0x7E8, 0x18DAF110, 0x7E8, 0x2000_0000]);
        assert_eq!(list.to_hex_list(), vec!["7e8", "18daf110"]);
    }

    #[test]
    fn test_mask_pair() {
        let pair = MaskPair::parse("7f0", "7e0").unwrap();
        assert_eq!(pair.mask_text(), "000007f0");
        assert_eq!(pair.masking_result_text(), "000007e0");

        assert_eq!(MaskPair::from_device(0, 0), None);
        assert!(MaskPair::from_device(0x7F0, 0).is_some());
        assert!(MaskPair::parse("7f0", "zzz").is_err());
    }

    #[test]
    fn test_inactivity_timeout() {
        assert_eq!("0.3".parse::<InactivityTimeout>().unwrap().seconds(), 0.3);
        assert!("0".parse::<InactivityTimeout>().is_err());
        assert!("-1".parse::<InactivityTimeout>().is_err());
        assert!("abc".parse::<InactivityTimeout>().is_err());
        assert!(InactivityTimeout::new(f64::INFINITY).is_err());
    }
}
