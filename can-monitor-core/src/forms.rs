//! Filter form state
//!
//! Each form (whitelist, blacklist, mask, inactivity timeout) tracks whether
//! its local content matches the device with a small state machine:
//!
//! ```text
//!   edit            submit            success
//! Clean ──► Dirty ──────────► InFlight ─────────► Clean
//!             ▲                  │
//!             └──────────────────┘ failure
//! ```
//!
//! Requests run asynchronously; a form refuses a second request while one is
//! in flight.

use crate::filters::{IdentifierList, InactivityTimeout, MaskPair};
use crate::types::{MonitorError, Result};

/// Synchronisation state of a form with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Local content matches what the device last reported or accepted
    Clean,
    /// Local content was edited, or the last request failed
    Dirty,
    /// A request is waiting for its reply
    InFlight,
}

/// State machine shared by all forms
#[derive(Debug, Clone)]
pub struct FormControl {
    state: ControlState,
    /// State to fall back to when a request is abandoned
    before_submit: ControlState,
    edited_in_flight: bool,
    needs_reload: bool,
    /// A request was sent after the device content went stale
    submitted_since_stale: bool,
}

impl Default for FormControl {
    fn default() -> Self {
        Self {
            state: ControlState::Clean,
            before_submit: ControlState::Clean,
            edited_in_flight: false,
            needs_reload: false,
            submitted_since_stale: false,
        }
    }
}

impl FormControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Local content changed
    pub fn edit(&mut self) {
        match self.state {
            ControlState::InFlight => self.edited_in_flight = true,
            _ => self.state = ControlState::Dirty,
        }
    }

    /// A request is about to be sent
    pub fn submit(&mut self) -> Result<()> {
        if self.state == ControlState::InFlight {
            return Err(MonitorError::RequestInFlight);
        }
        self.before_submit = self.state;
        self.state = ControlState::InFlight;
        self.edited_in_flight = false;
        self.submitted_since_stale = true;
        Ok(())
    }

    /// The device accepted the request or returned fresh content
    pub fn succeed(&mut self) {
        self.state = if self.edited_in_flight {
            ControlState::Dirty
        } else {
            ControlState::Clean
        };
        self.edited_in_flight = false;
        if self.submitted_since_stale {
            self.needs_reload = false;
        }
    }

    /// The request failed; the form stays editable for a retry
    pub fn fail(&mut self) {
        self.state = ControlState::Dirty;
        self.edited_in_flight = false;
    }

    /// The request went unanswered and nothing changed locally; return to
    /// the state before it was submitted
    pub fn abandon(&mut self) {
        if self.state != ControlState::InFlight {
            return;
        }
        self.state = if self.edited_in_flight {
            ControlState::Dirty
        } else {
            self.before_submit
        };
        self.edited_in_flight = false;
    }

    /// Device-side content changed behind this form's back. Only a request
    /// submitted after this call can clear the mark.
    pub fn mark_needs_reload(&mut self) {
        self.needs_reload = true;
        self.submitted_since_stale = false;
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }
}

/// Whitelist or blacklist editor
#[derive(Debug, Default)]
pub struct ListForm {
    list: IdentifierList,
    control: FormControl,
}

impl ListForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &IdentifierList {
        &self.list
    }

    pub fn control(&self) -> &FormControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut FormControl {
        &mut self.control
    }

    /// Add an identifier; rejected input leaves the form untouched
    pub fn add(&mut self, text: &str) -> Result<()> {
        self.list.add(text)?;
        self.control.edit();
        Ok(())
    }

    pub fn remove(&mut self, text: &str) -> Result<()> {
        self.list.remove(text)?;
        self.control.edit();
        Ok(())
    }

    /// Start installing the edited list; returns the identifiers to send
    pub fn begin_apply(&mut self) -> Result<Vec<String>> {
        self.control.submit()?;
        Ok(self.list.to_hex_list())
    }

    pub fn begin_reset(&mut self) -> Result<()> {
        self.control.submit()
    }

    pub fn begin_reload(&mut self) -> Result<()> {
        self.control.submit()
    }

    /// Outcome of an apply request
    pub fn finish_apply(&mut self, success: bool) {
        if success {
            self.control.succeed();
        } else {
            self.control.fail();
        }
    }

    /// Outcome of a reset request; the list is emptied only on success
    pub fn finish_reset(&mut self, success: bool) {
        if success {
            self.list.clear();
            self.control.succeed();
        } else {
            self.control.fail();
        }
    }

    /// Outcome of a reload; `None` means the request failed
    pub fn finish_reload(&mut self, identifiers: Option<&[u32]>) {
        match identifiers {
            Some(identifiers) => {
                self.list.replace_from_device(identifiers);
                self.control.succeed();
            }
            None => self.control.fail(),
        }
    }
}

/// Mask pair editor; `None` means no mask installed
#[derive(Debug, Default)]
pub struct MaskForm {
    mask: Option<MaskPair>,
    control: FormControl,
}

impl MaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> Option<MaskPair> {
        self.mask
    }

    pub fn control(&self) -> &FormControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut FormControl {
        &mut self.control
    }

    pub fn set(&mut self, mask: &str, masking_result: &str) -> Result<()> {
        self.mask = Some(MaskPair::parse(mask, masking_result)?);
        self.control.edit();
        Ok(())
    }

    /// Start installing the edited pair
    pub fn begin_apply(&mut self) -> Result<Option<MaskPair>> {
        self.control.submit()?;
        Ok(self.mask)
    }

    pub fn begin_reset(&mut self) -> Result<()> {
        self.control.submit()
    }

    pub fn begin_reload(&mut self) -> Result<()> {
        self.control.submit()
    }

    pub fn finish_apply(&mut self, success: bool) {
        if success {
            self.control.succeed();
        } else {
            self.control.fail();
        }
    }

    pub fn finish_reset(&mut self, success: bool) {
        if success {
            self.mask = None;
            self.control.succeed();
        } else {
            self.control.fail();
        }
    }

    /// Outcome of a reload; `None` means the request failed
    pub fn finish_reload(&mut self, reported: Option<(u32, u32)>) {
        match reported {
            Some((mask, masking_result)) => {
                self.mask = MaskPair::from_device(mask, masking_result);
                self.control.succeed();
            }
            None => self.control.fail(),
        }
    }

    /// Texts shown in the two mask fields
    pub fn texts(&self) -> (String, String) {
        match self.mask {
            Some(pair) => (pair.mask_text(), pair.masking_result_text()),
            None => (String::new(), String::new()),
        }
    }
}

/// Inactivity timeout editor
#[derive(Debug, Default)]
pub struct TimeoutForm {
    timeout: Option<InactivityTimeout>,
    control: FormControl,
}

impl TimeoutForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(&self) -> Option<InactivityTimeout> {
        self.timeout
    }

    pub fn control(&self) -> &FormControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut FormControl {
        &mut self.control
    }

    pub fn set(&mut self, text: &str) -> Result<()> {
        self.timeout = Some(text.parse()?);
        self.control.edit();
        Ok(())
    }

    /// Start sending the edited timeout
    pub fn begin_apply(&mut self) -> Result<InactivityTimeout> {
        let timeout = self
            .timeout
            .ok_or_else(|| MonitorError::InvalidTimeout(String::new()))?;
        self.control.submit()?;
        Ok(timeout)
    }

    pub fn begin_reload(&mut self) -> Result<()> {
        self.control.submit()
    }

    pub fn finish_apply(&mut self, success: bool) {
        if success {
            self.control.succeed();
        } else {
            self.control.fail();
        }
    }

    pub fn finish_reload(&mut self, seconds: Option<f64>) {
        match seconds.map(InactivityTimeout::new) {
            Some(Ok(timeout)) => {
                self.timeout = Some(timeout);
                self.control.succeed();
            }
            Some(Err(err)) => {
                log::warn!("Device reported an unusable timeout: {}", err);
                self.control.fail();
            }
            None => self.control.fail(),
        }
    }
}

/// All filter forms of the console
#[derive(Debug, Default)]
pub struct FilterForms {
    pub whitelist: ListForm,
    pub blacklist: ListForm,
    pub mask: MaskForm,
    pub timeout: TimeoutForm,
}

impl FilterForms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installing a whitelist also rewrites the device mask
    pub fn finish_whitelist_apply(&mut self, success: bool) {
        self.whitelist.finish_apply(success);
        if success {
            self.mask.control_mut().mark_needs_reload();
        }
    }
}
