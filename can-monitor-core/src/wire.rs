//! Stream message decoding
//!
//! The capture device broadcasts one compact JSON object per frame:
//! `{"t": 1700000000.123, "i": 291, "e": false, "r": false, "l": 2, "d": "0a1b"}`.

use crate::types::{AddressWidth, FrameEvent, MonitorError, Result};
use serde::Deserialize;

/// Frame as it appears on the wire
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireFrame {
    #[serde(rename = "i")]
    pub identifier: u32,
    #[serde(rename = "e")]
    pub extended: bool,
    #[serde(rename = "r")]
    pub remote_request: bool,
    #[serde(rename = "l")]
    pub data_length_code: u8,
    #[serde(rename = "d")]
    pub data: String,
    #[serde(rename = "t")]
    pub time: f64,
}

impl WireFrame {
    /// Validate the payload and convert into a frame event
    pub fn into_event(self) -> Result<FrameEvent> {
        if !is_hex_bytes(&self.data) {
            return Err(MonitorError::InvalidPayload(self.data));
        }

        Ok(FrameEvent {
            identifier: self.identifier,
            width: AddressWidth::from_extended_flag(self.extended),
            is_remote_request: self.remote_request,
            data_length_code: self.data_length_code,
            payload_hex: self.data.to_ascii_lowercase(),
            timestamp_secs: self.time,
        })
    }
}

/// Decode one text message from the frame stream
pub fn decode_message(text: &str) -> Result<FrameEvent> {
    let wire: WireFrame = serde_json::from_str(text)?;
    wire.into_event()
}

fn is_hex_bytes(data: &str) -> bool {
    data.len() % 2 == 0 && data.bytes().all(|b| b.is_ascii_hexdigit())
}
