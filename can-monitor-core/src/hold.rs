//! Write-behind buffer used while the display is held
//!
//! While holding, the registry keeps computing every field value but parks
//! it here instead of touching the visible state. Only the latest value per
//! field survives; the counter field already carries the fully incremented
//! count, so last-write-wins is correct for it too.

use crate::identity::FieldId;
use crate::types::{MonitorError, Result};
use std::collections::HashMap;

/// Value destined for one display field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Count(u64),
}

impl FieldValue {
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(count) => Some(*count),
            FieldValue::Text(_) => None,
        }
    }
}

/// Pending updates, present only while holding
#[derive(Debug, Default)]
pub struct HoldBuffer {
    pending: Option<HashMap<FieldId, FieldValue>>,
}

impl HoldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Start holding. Re-entering an active hold keeps the pending values.
    pub fn begin(&mut self) {
        if self.pending.is_some() {
            log::debug!("Hold requested while already holding, ignoring");
            return;
        }
        self.pending = Some(HashMap::new());
    }

    /// Park the latest value for `field`, replacing any previous one
    pub fn record(&mut self, field: FieldId, value: FieldValue) -> Result<()> {
        let pending = self.pending.as_mut().ok_or(MonitorError::NotHolding)?;
        pending.insert(field, value);
        Ok(())
    }

    /// Latest parked value for `field`, if any
    pub fn pending(&self, field: &FieldId) -> Option<&FieldValue> {
        self.pending.as_ref()?.get(field)
    }

    /// Number of fields with a parked value
    pub fn len(&self) -> usize {
        self.pending.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop holding and hand back every parked value, in no particular order
    pub fn resume(&mut self) -> Vec<(FieldId, FieldValue)> {
        match self.pending.take() {
            Some(pending) => pending.into_iter().collect(),
            None => Vec::new(),
        }
    }
}
