//! Text rendering of the frame table, status line and filter forms

use can_monitor_core::{ControlState, FilterForms, FormControl, FrameRegistry, IdentifierList};
use std::fmt::Write;

const RULE: &str = "───────────────────────────────────────────────────────────────────────────────";

/// Render every record as one row, in creation order. Row numbers are
/// 1-based and are what `wl row <n>` refers to.
pub fn render_table(registry: &FrameRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<8}  {:>3}  {:<23}  {:>8}  {:<12}",
        "#", "ID", "DLC", "Data", "Seen", "Time"
    );
    let _ = writeln!(out, "{}", RULE);

    for (index, record) in registry.rows().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<8}  {:>3}  {:<23}  {:>8}  {:<12}",
            index + 1,
            record.identifier_text(),
            record.dlc_text(),
            record.payload_text(),
            record.times_seen(),
            record.timestamp_text(),
        );
    }
    out
}

/// One-line summary shown under the table
pub fn render_status(registry: &FrameRegistry, connected: bool, malformed: u64) -> String {
    let stats = registry.stats();
    let mut line = format!(
        "{}  |  {} std / {} ext ids  |  {} frames",
        if connected { "● connected" } else { "○ disconnected" },
        stats.standard_records,
        stats.extended_records,
        stats.frames_accepted,
    );
    if malformed > 0 {
        let _ = write!(line, "  |  {} malformed", malformed);
    }
    if stats.holding {
        let _ = write!(line, "  |  HOLD ({} pending)", stats.pending_updates);
    }
    line
}

/// Detailed counters for the `stats` command
pub fn render_stats(registry: &FrameRegistry, malformed: u64) -> String {
    let stats = registry.stats();
    let mut out = String::new();
    let _ = writeln!(out, "📊 Registry:");
    let _ = writeln!(out, "  11-bit identifiers: {}", stats.standard_records);
    let _ = writeln!(out, "  29-bit identifiers: {}", stats.extended_records);
    let _ = writeln!(out, "  Frames accepted:    {}", stats.frames_accepted);
    let _ = writeln!(out, "  Remote dropped:     {}", stats.remote_frames_dropped);
    let _ = writeln!(out, "  Malformed skipped:  {}", malformed);
    let _ = write!(
        out,
        "  Holding:            {}",
        if stats.holding {
            format!("yes, {} field(s) pending", stats.pending_updates)
        } else {
            "no".to_string()
        }
    );
    out
}

/// Current content and state of every filter form
pub fn render_filters(forms: &FilterForms) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Whitelist [{}]: {}",
        state_label(forms.whitelist.control()),
        list_text(forms.whitelist.list())
    );
    let _ = writeln!(
        out,
        "Blacklist [{}]: {}",
        state_label(forms.blacklist.control()),
        list_text(forms.blacklist.list())
    );

    let (mask, masking_result) = forms.mask.texts();
    if mask.is_empty() {
        let _ = writeln!(out, "Mask      [{}]: (none)", state_label(forms.mask.control()));
    } else {
        let _ = writeln!(
            out,
            "Mask      [{}]: mask={} result={}",
            state_label(forms.mask.control()),
            mask,
            masking_result
        );
    }

    let timeout = forms
        .timeout
        .timeout()
        .map_or_else(|| "(unknown)".to_string(), |timeout| format!("{} s", timeout));
    let _ = write!(
        out,
        "Timeout   [{}]: {}",
        state_label(forms.timeout.control()),
        timeout
    );
    out
}

fn list_text(list: &IdentifierList) -> String {
    if list.is_empty() {
        "(empty)".to_string()
    } else {
        list.to_hex_list().join(" ")
    }
}

fn state_label(control: &FormControl) -> &'static str {
    match control.state() {
        ControlState::Clean if control.needs_reload() => "stale",
        ControlState::Clean => "clean",
        ControlState::Dirty => "edited",
        ControlState::InFlight => "busy",
    }
}
