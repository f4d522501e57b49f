//! CAN Monitor Library
//!
//! The live frame aggregation engine behind the `can-monitor` console. It
//! ingests the frame stream relayed by a CAN capture device, keeps one display
//! record per `(address width, identifier)` and can freeze the visible table
//! without losing updates.
//!
//! # Architecture
//!
//! This library is intentionally free of I/O:
//! - Decodes stream messages into [`FrameEvent`]s ([`wire`])
//! - Deduplicates frames and keeps per-identifier counters ([`FrameRegistry`])
//! - Buffers cell updates while the view is held ([`HoldBuffer`])
//! - Renders identifiers, payloads and timestamps ([`format`])
//! - Validates and edits the device filter settings ([`filters`], [`forms`])
//!
//! Network access (the WebSocket stream and the device's HTTP API) lives in
//! the application layer (can-monitor-cli).
//!
//! # Example Usage
//!
//! ```
//! use can_monitor_core::{wire, AddressWidth, FrameRegistry};
//!
//! let mut registry = FrameRegistry::new();
//! let frame = wire::decode_message(
//!     r#"{"t": 1700000000.25, "i": 2024, "e": false, "r": false, "l": 2, "d": "0a1b"}"#,
//! )
//! .unwrap();
//!
//! registry.hold();
//! registry.update(&frame);
//! assert_eq!(registry.get(AddressWidth::Standard, 2024).unwrap().times_seen(), 0);
//!
//! registry.resume();
//! let record = registry.get(AddressWidth::Standard, 2024).unwrap();
//! assert_eq!(record.identifier_text(), "7e8");
//! assert_eq!(record.payload_text(), "0a 1b");
//! assert_eq!(record.times_seen(), 1);
//! ```

// Public modules
pub mod filters;
pub mod format;
pub mod forms;
pub mod hold;
pub mod identity;
pub mod registry;
pub mod types;
pub mod wire;

// Re-export main types for convenience
pub use filters::{CanIdentifier, IdentifierList, InactivityTimeout, MaskPair};
pub use forms::{ControlState, FilterForms, FormControl, ListForm, MaskForm, TimeoutForm};
pub use hold::{FieldValue, HoldBuffer};
pub use identity::{FieldId, FieldKind, IdentityAllocator, RecordId};
pub use registry::{FrameRecord, FrameRegistry, RegistryStats};
pub use types::{AddressWidth, FrameEvent, MonitorError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh registry is empty and live
        let registry = FrameRegistry::new();
        let stats = registry.stats();
        assert_eq!(stats.records(), 0);
        assert!(!stats.holding);
    }
}
