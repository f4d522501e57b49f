//! Core types for the CAN monitor library
//!
//! This module defines the frame events the monitor ingests from the capture
//! device, the addressing classes that partition the identifier space, and the
//! error type shared by the whole library.

use std::fmt;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Addressing width of a CAN identifier.
///
/// Standard and extended identifiers are disjoint keyspaces: `0x123` under
/// each class refers to two different frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressWidth {
    /// 11-bit identifier (0x000..=0x7FF)
    Standard,
    /// 29-bit identifier (0x00000000..=0x1FFFFFFF)
    Extended,
}

impl AddressWidth {
    /// Map the wire flag `e` onto an addressing class
    pub fn from_extended_flag(extended: bool) -> Self {
        if extended {
            AddressWidth::Extended
        } else {
            AddressWidth::Standard
        }
    }

    /// Number of hex digits used to render identifiers of this class
    pub fn hex_digits(self) -> usize {
        match self {
            AddressWidth::Standard => 3,
            AddressWidth::Extended => 8,
        }
    }

    /// Largest identifier representable in this class
    pub fn max_identifier(self) -> u32 {
        match self {
            AddressWidth::Standard => 0x7FF,
            AddressWidth::Extended => 0x1FFF_FFFF,
        }
    }
}

impl fmt::Display for AddressWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressWidth::Standard => write!(f, "11-bit"),
            AddressWidth::Extended => write!(f, "29-bit"),
        }
    }
}

/// One observed bus frame, as relayed by the capture device.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvent {
    /// CAN identifier (range depends on `width`)
    pub identifier: u32,
    /// Addressing class of the identifier
    pub width: AddressWidth,
    /// True for remote-request frames (no payload, never displayed)
    pub is_remote_request: bool,
    /// Data length code as reported by the device
    pub data_length_code: u8,
    /// Payload bytes as lowercase hex, two digits per byte
    pub payload_hex: String,
    /// Unix epoch seconds with sub-second precision
    pub timestamp_secs: f64,
}

impl FrameEvent {
    /// Build a data frame event
    pub fn data(
        identifier: u32,
        width: AddressWidth,
        data_length_code: u8,
        payload_hex: impl Into<String>,
        timestamp_secs: f64,
    ) -> Self {
        Self {
            identifier,
            width,
            is_remote_request: false,
            data_length_code,
            payload_hex: payload_hex.into(),
            timestamp_secs,
        }
    }

    /// Build a remote-request frame event
    pub fn remote_request(identifier: u32, width: AddressWidth, timestamp_secs: f64) -> Self {
        Self {
            identifier,
            width,
            is_remote_request: true,
            data_length_code: 0,
            payload_hex: String::new(),
            timestamp_secs,
        }
    }

    /// Lookup key of the frame in the registry
    pub fn key(&self) -> (AddressWidth, u32) {
        (self.width, self.identifier)
    }
}

/// Errors that can occur in the monitor library
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to decode frame message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid payload hex: {0:?}")]
    InvalidPayload(String),

    #[error("Invalid CAN identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("CAN identifier already in the list: {0}")]
    DuplicateIdentifier(String),

    #[error("CAN identifier not in the list: {0}")]
    UnknownIdentifier(String),

    #[error("Hold buffer is not active")]
    NotHolding,

    #[error("Invalid inactivity timeout: {0:?}")]
    InvalidTimeout(String),

    #[error("Control is busy: a request is already in flight")]
    RequestInFlight,
}
