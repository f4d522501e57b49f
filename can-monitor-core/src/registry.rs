//! Frame registry
//!
//! Deduplicates the incoming frame stream by `(address width, identifier)`
//! and keeps one display record per key. Every accepted frame refreshes the
//! record's cells and bumps its `times seen` counter. While the view is held
//! the new cell values are parked in the [`HoldBuffer`] and only reach the
//! records on [`FrameRegistry::resume`].

use crate::format;
use crate::hold::{FieldValue, HoldBuffer};
use crate::identity::{FieldId, FieldKind, IdentityAllocator, RecordId};
use crate::types::{AddressWidth, FrameEvent};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Display state of one distinct frame key
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    id: RecordId,
    identifier: u32,
    width: AddressWidth,
    identifier_text: String,
    dlc_text: String,
    payload_text: String,
    times_seen: u64,
    timestamp_text: String,
}

impl FrameRecord {
    fn new(id: RecordId, identifier: u32, width: AddressWidth) -> Self {
        Self {
            id,
            identifier,
            width,
            identifier_text: format::format_identifier(identifier, width),
            dlc_text: String::new(),
            payload_text: String::new(),
            times_seen: 0,
            timestamp_text: String::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    pub fn width(&self) -> AddressWidth {
        self.width
    }

    /// Identifier text, rendered once when the record was created
    pub fn identifier_text(&self) -> &str {
        &self.identifier_text
    }

    pub fn dlc_text(&self) -> &str {
        &self.dlc_text
    }

    pub fn payload_text(&self) -> &str {
        &self.payload_text
    }

    pub fn times_seen(&self) -> u64 {
        self.times_seen
    }

    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }

    /// Overwrite one visible cell. Returns false on a kind/value mismatch.
    fn apply(&mut self, field: FieldKind, value: FieldValue) -> bool {
        match (field, value) {
            (FieldKind::Dlc, FieldValue::Text(text)) => self.dlc_text = text,
            (FieldKind::Payload, FieldValue::Text(text)) => self.payload_text = text,
            (FieldKind::Timestamp, FieldValue::Text(text)) => self.timestamp_text = text,
            (FieldKind::TimesSeen, FieldValue::Count(count)) => self.times_seen = count,
            (field, value) => {
                log::warn!("Ignoring {:?} for {:?} field of record {}", value, field, self.id);
                return false;
            }
        }
        true
    }
}

/// Counters describing the registry contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Distinct 11-bit identifiers seen
    pub standard_records: usize,
    /// Distinct 29-bit identifiers seen
    pub extended_records: usize,
    /// Data frames accepted into the registry
    pub frames_accepted: u64,
    /// Remote-request frames discarded
    pub remote_frames_dropped: u64,
    /// Fields with a value waiting for resume
    pub pending_updates: usize,
    /// Whether the view is currently held
    pub holding: bool,
}

impl RegistryStats {
    pub fn records(&self) -> usize {
        self.standard_records + self.extended_records
    }
}

/// Two-level store: address width, then identifier, to display record
#[derive(Debug, Default)]
pub struct FrameRegistry {
    records: HashMap<AddressWidth, HashMap<u32, FrameRecord>>,
    keys: HashMap<RecordId, (AddressWidth, u32)>,
    ids: IdentityAllocator,
    hold: HoldBuffer,
    frames_accepted: u64,
    remote_frames_dropped: u64,
    generation: u64,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one frame event.
    ///
    /// Remote-request frames are counted and dropped. Data frames create the
    /// record on first sight and then refresh DLC, payload, counter and
    /// timestamp, either on the record itself or in the hold buffer.
    pub fn update(&mut self, frame: &FrameEvent) {
        if frame.is_remote_request {
            self.remote_frames_dropped += 1;
            log::trace!("Dropping remote request frame 0x{:X}", frame.identifier);
            return;
        }
        self.frames_accepted += 1;

        let holding = self.hold.is_active();
        let by_identifier = self.records.entry(frame.width).or_default();
        let record = match by_identifier.entry(frame.identifier) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let id = self.ids.next_identity();
                self.keys.insert(id, frame.key());
                self.generation += 1;
                log::debug!(
                    "New {} frame 0x{:X} as record {}",
                    frame.width,
                    frame.identifier,
                    id
                );
                entry.insert(FrameRecord::new(id, frame.identifier, frame.width))
            }
        };

        let id = record.id;
        let seen_field = FieldId::new(id, FieldKind::TimesSeen);
        let times_seen = self
            .hold
            .pending(&seen_field)
            .and_then(FieldValue::as_count)
            .unwrap_or(record.times_seen)
            + 1;

        let values = [
            (FieldKind::Dlc, FieldValue::Text(format::format_dlc(frame.data_length_code))),
            (FieldKind::Payload, FieldValue::Text(format::format_payload(&frame.payload_hex))),
            (FieldKind::TimesSeen, FieldValue::Count(times_seen)),
            (FieldKind::Timestamp, FieldValue::Text(format::format_timestamp(frame.timestamp_secs))),
        ];

        if holding {
            log::trace!("Holding update of record {}", id);
            for (field, value) in values {
                if let Err(err) = self.hold.record(FieldId::new(id, field), value) {
                    log::error!("Lost held update of record {}: {}", id, err);
                }
            }
        } else {
            for (field, value) in values {
                record.apply(field, value);
            }
            self.generation += 1;
        }
    }

    /// Freeze the visible state; later updates are buffered
    pub fn hold(&mut self) {
        if !self.hold.is_active() {
            log::info!("Display held");
        }
        self.hold.begin();
    }

    /// Apply every buffered value and unfreeze. Returns how many fields were
    /// applied.
    pub fn resume(&mut self) -> usize {
        if !self.hold.is_active() {
            return 0;
        }

        let mut applied = 0;
        for (field, value) in self.hold.resume() {
            let Some((width, identifier)) = self.keys.get(&field.record).copied() else {
                log::warn!("Held update for unknown record {}, skipping", field.record);
                continue;
            };
            match self
                .records
                .get_mut(&width)
                .and_then(|by_identifier| by_identifier.get_mut(&identifier))
            {
                Some(record) => {
                    if record.apply(field.field, value) {
                        applied += 1;
                    }
                }
                None => log::warn!("Held update for unknown record {}, skipping", field.record),
            }
        }

        self.generation += 1;
        log::info!("Display resumed, {} held field(s) applied", applied);
        applied
    }

    /// Hold when live, resume when held. Returns the new holding state.
    pub fn toggle_hold(&mut self) -> bool {
        if self.hold.is_active() {
            self.resume();
        } else {
            self.hold();
        }
        self.hold.is_active()
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_active()
    }

    pub fn get(&self, width: AddressWidth, identifier: u32) -> Option<&FrameRecord> {
        self.records.get(&width)?.get(&identifier)
    }

    /// All records in creation order
    pub fn rows(&self) -> Vec<&FrameRecord> {
        let mut rows: Vec<&FrameRecord> = self.records.values().flat_map(HashMap::values).collect();
        rows.sort_by_key(|record| record.id);
        rows
    }

    /// Changes whenever the visible state changes
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> RegistryStats {
        let count = |width: AddressWidth| self.records.get(&width).map_or(0, HashMap::len);
        RegistryStats {
            standard_records: count(AddressWidth::Standard),
            extended_records: count(AddressWidth::Extended),
            frames_accepted: self.frames_accepted,
            remote_frames_dropped: self.remote_frames_dropped,
            pending_updates: self.hold.len(),
            holding: self.hold.is_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(identifier: u32, width: AddressWidth, payload: &str, time: f64) -> FrameEvent {
        FrameEvent::data(identifier, width, (payload.len() / 2) as u8, payload, time)
    }

    #[test]
    fn test_first_frame_creates_record() {
        let mut registry = FrameRegistry::new();
        registry.update(&data(0x123, AddressWidth::Standard, "0a1bff", 1700000000.5));

        let record = registry.get(AddressWidth::Standard, 0x123).unwrap();
        assert_eq!(record.id().get(), 1);
        assert_eq!(record.identifier_text(), "123");
        assert_eq!(record.dlc_text(), "3");
        assert_eq!(record.payload_text(), "0a 1b ff");
        assert_eq!(record.times_seen(), 1);
        assert!(record.timestamp_text().ends_with(".500"));
    }

    #[test]
    fn test_repeated_frames_update_in_place() {
        let mut registry = FrameRegistry::new();
        registry.update(&data(0x100, AddressWidth::Standard, "01", 1.0));
        registry.update(&data(0x100, AddressWidth::Standard, "0203", 2.0));

        let stats = registry.stats();
        assert_eq!(stats.records(), 1);
        assert_eq!(stats.frames_accepted, 2);

        let record = registry.get(AddressWidth::Standard, 0x100).unwrap();
        assert_eq!(record.times_seen(), 2);
        assert_eq!(record.payload_text(), "02 03");
        assert_eq!(record.dlc_text(), "2");
    }

    #[test]
    fn test_same_identifier_in_both_widths_is_two_records() {
        let mut registry = FrameRegistry::new();
        registry.update(&data(0x123, AddressWidth::Standard, "", 1.0));
        registry.update(&data(0x123, AddressWidth::Extended, "", 1.0));
        registry.update(&data(0x123, AddressWidth::Extended, "", 2.0));

        let standard = registry.get(AddressWidth::Standard, 0x123).unwrap();
        let extended = registry.get(AddressWidth::Extended, 0x123).unwrap();
        assert_ne!(standard.id(), extended.id());
        assert_eq!(standard.times_seen(), 1);
        assert_eq!(extended.times_seen(), 2);
        assert_eq!(standard.identifier_text(), "123");
        assert_eq!(extended.identifier_text(), "00000123");
    }

    #[test]
    fn test_remote_requests_never_touch_records() {
        let mut registry = FrameRegistry::new();
        registry.update(&FrameEvent::remote_request(0x7DF, AddressWidth::Standard, 1.0));
        assert!(registry.get(AddressWidth::Standard, 0x7DF).is_none());
        assert_eq!(registry.generation(), 0);

        registry.update(&data(0x7DF, AddressWidth::Standard, "02", 2.0));
        registry.update(&FrameEvent::remote_request(0x7DF, AddressWidth::Standard, 3.0));

        let record = registry.get(AddressWidth::Standard, 0x7DF).unwrap();
        assert_eq!(record.times_seen(), 1);
        assert_eq!(registry.stats().remote_frames_dropped, 2);
    }

    #[test]
    fn test_hold_freezes_visible_state() {
        let mut registry = FrameRegistry::new();
        registry.update(&data(0x10, AddressWidth::Standard, "aa", 1.0));
        registry.hold();
        let frozen = registry.generation();

        registry.update(&data(0x10, AddressWidth::Standard, "bbcc", 2.0));
        registry.update(&data(0x10, AddressWidth::Standard, "dd", 3.0));

        let record = registry.get(AddressWidth::Standard, 0x10).unwrap();
        assert_eq!(record.payload_text(), "aa");
        assert_eq!(record.times_seen(), 1);
        assert_eq!(registry.generation(), frozen);
        assert_eq!(registry.stats().pending_updates, 4);

        assert_eq!(registry.resume(), 4);
        let record = registry.get(AddressWidth::Standard, 0x10).unwrap();
        assert_eq!(record.payload_text(), "dd");
        assert_eq!(record.dlc_text(), "1");
        assert_eq!(record.times_seen(), 3);
        assert!(!registry.is_holding());
    }

    #[test]
    fn test_record_created_while_holding_stays_blank() {
        let mut registry = FrameRegistry::new();
        registry.hold();
        registry.update(&data(0x321, AddressWidth::Standard, "01", 1.0));

        let record = registry.get(AddressWidth::Standard, 0x321).unwrap();
        assert_eq!(record.identifier_text(), "321");
        assert_eq!(record.times_seen(), 0);
        assert_eq!(record.payload_text(), "");

        registry.resume();
        let record = registry.get(AddressWidth::Standard, 0x321).unwrap();
        assert_eq!(record.times_seen(), 1);
        assert_eq!(record.payload_text(), "01");
    }

    #[test]
    fn test_toggle_hold_round_trip() {
        let mut registry = FrameRegistry::new();
        assert!(registry.toggle_hold());
        registry.update(&data(0x1, AddressWidth::Extended, "ff", 1.0));
        assert!(!registry.toggle_hold());
        assert_eq!(registry.get(AddressWidth::Extended, 0x1).unwrap().times_seen(), 1);
    }

    #[test]
    fn test_resume_without_hold_is_noop() {
        let mut registry = FrameRegistry::new();
        assert_eq!(registry.resume(), 0);
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_rows_in_creation_order() {
        let mut registry = FrameRegistry::new();
        registry.update(&data(0x300, AddressWidth::Standard, "", 1.0));
        registry.update(&data(0x100, AddressWidth::Extended, "", 1.0));
        registry.update(&data(0x200, AddressWidth::Standard, "", 1.0));
        registry.update(&data(0x300, AddressWidth::Standard, "", 2.0));

        let identifiers: Vec<&str> = registry.rows().iter().map(|r| r.identifier_text()).collect();
        assert_eq!(identifiers, vec!["300", "00000100", "200"]);
    }
}
