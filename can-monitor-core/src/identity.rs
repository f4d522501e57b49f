//! Stable handles for display records and their fields

use std::fmt;

/// Surrogate key of a frame record, assigned once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out record identities: strictly increasing from 1, never reused.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    last: u64,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_identity(&mut self) -> RecordId {
        self.last += 1;
        RecordId(self.last)
    }
}

/// The individually updatable cells of a frame record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Dlc,
    Payload,
    TimesSeen,
    Timestamp,
}

/// Address of one field of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    pub record: RecordId,
    pub field: FieldKind,
}

impl FieldId {
    pub fn new(record: RecordId, field: FieldKind) -> Self {
        Self { record, field }
    }
}
