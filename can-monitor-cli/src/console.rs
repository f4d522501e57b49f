//! Interactive console
//!
//! The console owns the frame registry and the filter forms. One loop
//! multiplexes the frame stream, replies from the device API, typed commands
//! and the redraw ticker, so no state is ever shared between tasks. Requests
//! to the device run as spawned tasks and report back over a channel.

use crate::commands::{Command, CommandError, ListAction, HELP};
use crate::receiver::StreamEvent;
use crate::remote::{self, DeviceClient, ListTarget, Outcome, Request};
use crate::table;
use anyhow::Result;
use can_monitor_core::{FilterForms, FormControl, FrameRegistry, ListForm};
use std::io::{IsTerminal, Write};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Answer of the device to one request
#[derive(Debug)]
pub struct Reply {
    pub request: Request,
    pub outcome: remote::Result<Outcome>,
    /// Failures of silent requests are logged but not shown
    pub silent: bool,
}

/// Extra panel shown under the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    None,
    Help,
    Stats,
    Filters,
}

pub struct Console {
    registry: FrameRegistry,
    forms: FilterForms,
    client: DeviceClient,
    replies: mpsc::UnboundedSender<Reply>,
    connected: bool,
    malformed: u64,
    refresh: Duration,
    show_status: bool,
    panel: Panel,
    notice: Option<String>,
    drawn_generation: Option<u64>,
    needs_draw: bool,
}

impl Console {
    pub fn new(
        client: DeviceClient,
        replies: mpsc::UnboundedSender<Reply>,
        refresh: Duration,
        show_status: bool,
    ) -> Self {
        Self {
            registry: FrameRegistry::new(),
            forms: FilterForms::new(),
            client,
            replies,
            connected: false,
            malformed: 0,
            refresh,
            show_status,
            panel: Panel::None,
            notice: None,
            drawn_generation: None,
            needs_draw: true,
        }
    }

    /// Run until `quit` is typed
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<StreamEvent>,
        mut replies: mpsc::UnboundedReceiver<Reply>,
    ) -> Result<()> {
        self.reload_all();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut ticker = tokio::time::interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(event) = events.recv() => self.on_stream_event(event),
                Some(reply) = replies.recv() => self.on_reply(reply),
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if !self.on_line(&line) {
                            break;
                        }
                        self.draw()?;
                    }
                    Ok(None) => {
                        log::info!("Input closed, commands are no longer read");
                        stdin_open = false;
                    }
                    Err(err) => {
                        log::warn!("Cannot read commands: {}", err);
                        stdin_open = false;
                    }
                },
                _ = ticker.tick() => {
                    if self.needs_draw || self.drawn_generation != Some(self.registry.generation()) {
                        self.draw()?;
                    }
                }
            }
        }

        log::info!("Leaving monitor");
        Ok(())
    }

    fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Frame(frame) => self.registry.update(&frame),
            StreamEvent::Connected => {
                self.connected = true;
                self.needs_draw = true;
            }
            StreamEvent::Disconnected => {
                self.connected = false;
                self.needs_draw = true;
            }
            StreamEvent::Malformed(reason) => {
                log::trace!("Malformed message counted: {}", reason);
                self.malformed += 1;
                self.needs_draw = true;
            }
        }
    }

    /// Handle one typed line. Returns false when the console should stop.
    fn on_line(&mut self, line: &str) -> bool {
        self.notice = None;
        match line.parse::<Command>() {
            Ok(Command::Quit) => return false,
            Ok(command) => self.execute(command),
            Err(CommandError::Empty) => {}
            Err(err) => self.notify(format!("✗ {}", err)),
        }
        self.needs_draw = true;
        true
    }

    fn execute(&mut self, command: Command) {
        let result = match command {
            Command::ToggleHold => {
                self.registry.toggle_hold();
                Ok(())
            }
            Command::Hold => {
                self.registry.hold();
                Ok(())
            }
            Command::Resume => {
                self.registry.resume();
                Ok(())
            }
            Command::Show => {
                self.panel = Panel::None;
                Ok(())
            }
            Command::Stats => {
                self.panel = Panel::Stats;
                Ok(())
            }
            Command::Filters => {
                self.panel = Panel::Filters;
                Ok(())
            }
            Command::Help => {
                self.panel = Panel::Help;
                Ok(())
            }
            Command::Quit => Ok(()),
            Command::List(target, action) => {
                self.panel = Panel::Filters;
                self.list_command(target, action)
            }
            Command::MaskSet {
                mask,
                masking_result,
            } => {
                self.panel = Panel::Filters;
                self.forms
                    .mask
                    .set(&mask, &masking_result)
                    .and_then(|()| self.forms.mask.begin_apply())
                    .map(|pair| self.dispatch(Request::ApplyMask(pair), false))
            }
            Command::MaskReset => {
                self.panel = Panel::Filters;
                self.forms
                    .mask
                    .begin_reset()
                    .map(|()| self.dispatch(Request::ResetMask, false))
            }
            Command::MaskReload => {
                self.panel = Panel::Filters;
                self.forms
                    .mask
                    .begin_reload()
                    .map(|()| self.dispatch(Request::ReloadMask, false))
            }
            Command::TimeoutSet(seconds) => {
                self.panel = Panel::Filters;
                self.forms
                    .timeout
                    .set(&seconds)
                    .and_then(|()| self.forms.timeout.begin_apply())
                    .map(|timeout| self.dispatch(Request::ApplyTimeout(timeout), false))
            }
            Command::TimeoutReload => {
                self.panel = Panel::Filters;
                self.forms
                    .timeout
                    .begin_reload()
                    .map(|()| self.dispatch(Request::ReloadTimeout, false))
            }
        };

        if let Err(err) = result {
            self.notify(format!("✗ {}", err));
        }
    }

    fn list_command(&mut self, target: ListTarget, action: ListAction) -> can_monitor_core::Result<()> {
        match action {
            ListAction::Add(text) => self.list_form(target).add(&text),
            ListAction::Remove(text) => self.list_form(target).remove(&text),
            ListAction::AddRow(row) => {
                let identifier = self
                    .registry
                    .rows()
                    .get(row - 1)
                    .map(|record| record.identifier_text().to_string());
                match identifier {
                    Some(identifier) => self.list_form(target).add(&identifier),
                    None => {
                        self.notify(format!("✗ No row {} in the frame table", row));
                        Ok(())
                    }
                }
            }
            ListAction::Apply => {
                let identifiers = self.list_form(target).begin_apply()?;
                self.dispatch(Request::ApplyList(target, identifiers), false);
                Ok(())
            }
            ListAction::Reset => {
                self.list_form(target).begin_reset()?;
                self.dispatch(Request::ResetList(target), false);
                Ok(())
            }
            ListAction::Reload => {
                self.list_form(target).begin_reload()?;
                self.dispatch(Request::ReloadList(target), false);
                Ok(())
            }
        }
    }

    fn list_form(&mut self, target: ListTarget) -> &mut ListForm {
        match target {
            ListTarget::Whitelist => &mut self.forms.whitelist,
            ListTarget::Blacklist => &mut self.forms.blacklist,
        }
    }

    /// Fetch every form's content from the device
    fn reload_all(&mut self) {
        for target in [ListTarget::Whitelist, ListTarget::Blacklist] {
            if self.list_form(target).begin_reload().is_ok() {
                self.dispatch(Request::ReloadList(target), true);
            }
        }
        if self.forms.mask.begin_reload().is_ok() {
            self.dispatch(Request::ReloadMask, true);
        }
        if self.forms.timeout.begin_reload().is_ok() {
            self.dispatch(Request::ReloadTimeout, true);
        }
    }

    fn dispatch(&self, request: Request, silent: bool) {
        log::debug!("Sending request: {}", request.describe());
        let client = self.client.clone();
        let replies = self.replies.clone();
        tokio::spawn(async move {
            let outcome = client.perform(&request).await;
            if replies
                .send(Reply {
                    request,
                    outcome,
                    silent,
                })
                .is_err()
            {
                log::trace!("Console gone, dropping reply");
            }
        });
    }

    fn on_reply(&mut self, reply: Reply) {
        let Reply {
            request,
            outcome,
            silent,
        } = reply;
        let success = outcome.is_ok();

        if silent && !success {
            // Background reloads that fail leave the forms as they were
            self.request_control(&request).abandon();
        } else {
            self.finish_request(&request, &outcome);
        }

        match outcome {
            Ok(_) => {
                log::info!("Device request succeeded: {}", request.describe());
                if !silent {
                    self.notify(format!("✓ Done: {}", request.describe()));
                }
            }
            Err(err) if silent => {
                log::debug!("Could not {}: {}", request.describe(), err);
            }
            Err(err) => {
                log::warn!("Could not {}: {}", request.describe(), err);
                self.notify(format!("✗ Could not {}: {}", request.describe(), err));
            }
        }
        self.needs_draw = true;
    }

    /// Form control that a request was submitted from
    fn request_control(&mut self, request: &Request) -> &mut FormControl {
        match request {
            Request::ApplyList(target, _) | Request::ResetList(target) | Request::ReloadList(target) => {
                self.list_form(*target).control_mut()
            }
            Request::ApplyMask(_) | Request::ResetMask | Request::ReloadMask => {
                self.forms.mask.control_mut()
            }
            Request::ApplyTimeout(_) | Request::ReloadTimeout => self.forms.timeout.control_mut(),
        }
    }

    /// Feed a reply into the form it belongs to
    fn finish_request(&mut self, request: &Request, outcome: &remote::Result<Outcome>) {
        let success = outcome.is_ok();

        match request {
            Request::ApplyList(ListTarget::Whitelist, _) => {
                self.forms.finish_whitelist_apply(success);
                if success {
                    self.reload_stale_mask();
                }
            }
            Request::ApplyList(ListTarget::Blacklist, _) => self.forms.blacklist.finish_apply(success),
            Request::ResetList(target) => {
                self.list_form(*target).finish_reset(success);
                if success && *target == ListTarget::Whitelist {
                    self.forms.mask.control_mut().mark_needs_reload();
                    self.reload_stale_mask();
                }
            }
            Request::ReloadList(target) => {
                let identifiers = match outcome {
                    Ok(Outcome::Identifiers(identifiers)) => Some(identifiers.as_slice()),
                    _ => None,
                };
                self.list_form(*target).finish_reload(identifiers);
            }
            Request::ApplyMask(_) => {
                self.forms.mask.finish_apply(success);
                if success {
                    self.reload_stale_mask();
                }
            }
            Request::ResetMask => {
                self.forms.mask.finish_reset(success);
                if success {
                    self.reload_stale_mask();
                }
            }
            Request::ReloadMask => {
                let reported = match outcome {
                    Ok(Outcome::Mask {
                        mask,
                        masking_result,
                    }) => Some((*mask, *masking_result)),
                    _ => None,
                };
                self.forms.mask.finish_reload(reported);
                if success {
                    self.reload_stale_mask();
                }
            }
            Request::ApplyTimeout(_) => self.forms.timeout.finish_apply(success),
            Request::ReloadTimeout => {
                let seconds = match outcome {
                    Ok(Outcome::Timeout(seconds)) => Some(*seconds),
                    _ => None,
                };
                self.forms.timeout.finish_reload(seconds);
            }
        }
    }

    /// Refetch the mask after the device rewrote it. A mask request already
    /// in flight retries this once its reply arrives.
    fn reload_stale_mask(&mut self) {
        if self.forms.mask.control().needs_reload() && self.forms.mask.begin_reload().is_ok() {
            self.dispatch(Request::ReloadMask, true);
        }
    }

    fn notify(&mut self, message: String) {
        self.notice = Some(message);
        self.needs_draw = true;
    }

    /// Compose the whole screen
    fn render(&self) -> String {
        let mut screen = table::render_table(&self.registry);
        if self.show_status {
            screen.push('\n');
            screen.push_str(&table::render_status(&self.registry, self.connected, self.malformed));
            screen.push('\n');
        }

        let panel = match self.panel {
            Panel::None => None,
            Panel::Help => Some(HELP.to_string()),
            Panel::Stats => Some(table::render_stats(&self.registry, self.malformed)),
            Panel::Filters => Some(table::render_filters(&self.forms)),
        };
        if let Some(panel) = panel {
            screen.push('\n');
            screen.push_str(&panel);
            screen.push('\n');
        }
        if let Some(notice) = &self.notice {
            screen.push('\n');
            screen.push_str(notice);
            screen.push('\n');
        }
        screen
    }

    fn draw(&mut self) -> Result<()> {
        let screen = self.render();
        let mut stdout = std::io::stdout().lock();
        if stdout.is_terminal() {
            write!(stdout, "\x1B[2J\x1B[H")?;
        }
        write!(stdout, "{}\n> ", screen)?;
        stdout.flush()?;

        self.drawn_generation = Some(self.registry.generation());
        self.needs_draw = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_monitor_core::{AddressWidth, ControlState, FrameEvent};
    use url::Url;

    fn console() -> (Console, mpsc::UnboundedReceiver<Reply>) {
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let client = DeviceClient::new(base, Some(Duration::from_millis(200))).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (Console::new(client, tx, Duration::from_millis(500), true), rx)
    }

    fn frame(identifier: u32, width: AddressWidth) -> StreamEvent {
        StreamEvent::Frame(FrameEvent::data(identifier, width, 1, "ff", 1_700_000_000.0))
    }

    #[tokio::test]
    async fn test_hold_commands_drive_registry() {
        let (mut console, _replies) = console();
        console.on_stream_event(frame(0x7E8, AddressWidth::Standard));

        assert!(console.on_line("h"));
        assert!(console.registry.is_holding());
        console.on_stream_event(frame(0x7E8, AddressWidth::Standard));
        assert_eq!(
            console.registry.get(AddressWidth::Standard, 0x7E8).unwrap().times_seen(),
            1
        );

        assert!(console.on_line("resume"));
        assert_eq!(
            console.registry.get(AddressWidth::Standard, 0x7E8).unwrap().times_seen(),
            2
        );
        assert!(!console.on_line("quit"));
    }

    #[tokio::test]
    async fn test_row_command_adds_table_identifier() {
        let (mut console, _replies) = console();
        console.on_stream_event(frame(0x100, AddressWidth::Standard));
        console.on_stream_event(frame(0x18DA_F110, AddressWidth::Extended));

        console.on_line("wl row 2");
        assert_eq!(console.forms.whitelist.list().to_hex_list(), vec!["18daf110"]);

        console.on_line("wl row 9");
        assert!(console.notice.as_deref().unwrap().contains("No row 9"));
        assert_eq!(console.forms.whitelist.list().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_identifier_is_reported() {
        let (mut console, _replies) = console();
        console.on_line("bl add 800");
        assert!(console.notice.as_deref().unwrap().starts_with("✗"));
        assert!(console.forms.blacklist.list().is_empty());
        assert_eq!(console.forms.blacklist.control().state(), ControlState::Clean);
    }

    #[tokio::test]
    async fn test_failed_request_leaves_form_dirty() {
        let (mut console, mut replies) = console();
        console.on_line("wl add 7e8");
        console.on_line("wl set");
        assert_eq!(console.forms.whitelist.control().state(), ControlState::InFlight);

        // A second submit is refused while the first is pending
        console.on_line("wl set");
        assert!(console.notice.as_deref().unwrap().contains("in flight"));

        let reply = tokio::time::timeout(Duration::from_secs(10), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(reply.outcome.is_err());
        console.on_reply(reply);

        assert_eq!(console.forms.whitelist.control().state(), ControlState::Dirty);
        assert!(console
            .notice
            .as_deref()
            .unwrap()
            .starts_with("✗ Could not apply the identifier whitelist"));
        assert_eq!(console.forms.whitelist.list().to_hex_list(), vec!["7e8"]);
    }

    #[tokio::test]
    async fn test_successful_replies_update_forms() {
        let (mut console, _replies) = console();
        console.forms.blacklist.begin_reload().unwrap();
        console.on_reply(Reply {
            request: Request::ReloadList(ListTarget::Blacklist),
            outcome: Ok(Outcome::Identifiers(vec![0x7DF, 0x18DB_33F1])),
            silent: true,
        });
        assert_eq!(
            console.forms.blacklist.list().to_hex_list(),
            vec!["7df", "18db33f1"]
        );
        assert!(console.notice.is_none());

        console.forms.timeout.begin_reload().unwrap();
        console.on_reply(Reply {
            request: Request::ReloadTimeout,
            outcome: Ok(Outcome::Timeout(0.3)),
            silent: false,
        });
        assert_eq!(console.forms.timeout.timeout().unwrap().seconds(), 0.3);
        assert!(console.notice.as_deref().unwrap().starts_with("✓"));
    }

    #[tokio::test]
    async fn test_whitelist_apply_triggers_mask_reload() {
        let (mut console, _replies) = console();
        console.forms.whitelist.add("7e8").unwrap();
        let identifiers = console.forms.whitelist.begin_apply().unwrap();
        console.on_reply(Reply {
            request: Request::ApplyList(ListTarget::Whitelist, identifiers),
            outcome: Ok(Outcome::Done),
            silent: false,
        });

        assert_eq!(console.forms.whitelist.control().state(), ControlState::Clean);
        assert_eq!(console.forms.mask.control().state(), ControlState::InFlight);
    }

    #[tokio::test]
    async fn test_mask_reply_sent_before_whitelist_install_is_refetched() {
        let (mut console, _replies) = console();
        console.on_line("mask reload");
        assert_eq!(console.forms.mask.control().state(), ControlState::InFlight);

        console.forms.whitelist.add("7e8").unwrap();
        let identifiers = console.forms.whitelist.begin_apply().unwrap();
        console.on_reply(Reply {
            request: Request::ApplyList(ListTarget::Whitelist, identifiers),
            outcome: Ok(Outcome::Done),
            silent: false,
        });
        assert!(console.forms.mask.control().needs_reload());

        // Reply to the reload issued before the install: outdated content
        console.on_reply(Reply {
            request: Request::ReloadMask,
            outcome: Ok(Outcome::Mask {
                mask: 0x7F0,
                masking_result: 0x7E0,
            }),
            silent: false,
        });
        assert!(console.forms.mask.control().needs_reload());
        assert_eq!(console.forms.mask.control().state(), ControlState::InFlight);

        console.on_reply(Reply {
            request: Request::ReloadMask,
            outcome: Ok(Outcome::Mask {
                mask: 0x7FF,
                masking_result: 0x7E8,
            }),
            silent: true,
        });
        assert!(!console.forms.mask.control().needs_reload());
        assert_eq!(console.forms.mask.control().state(), ControlState::Clean);
        assert_eq!(
            console.forms.mask.texts(),
            ("000007ff".to_string(), "000007e8".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_startup_reload_keeps_forms_clean() {
        let (mut console, mut replies) = console();
        console.reload_all();

        for _ in 0..4 {
            let reply = tokio::time::timeout(Duration::from_secs(10), replies.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(reply.outcome.is_err());
            console.on_reply(reply);
        }

        assert_eq!(console.forms.whitelist.control().state(), ControlState::Clean);
        assert_eq!(console.forms.blacklist.control().state(), ControlState::Clean);
        assert_eq!(console.forms.mask.control().state(), ControlState::Clean);
        assert_eq!(console.forms.timeout.control().state(), ControlState::Clean);
        assert!(console.notice.is_none());
        assert!(!render_has_edited(&console));
    }

    fn render_has_edited(console: &Console) -> bool {
        table::render_filters(&console.forms).contains("[edited]")
    }

    #[tokio::test]
    async fn test_render_includes_panel_and_notice() {
        let (mut console, _replies) = console();
        console.on_stream_event(StreamEvent::Connected);
        console.on_stream_event(StreamEvent::Malformed("bad".into()));
        console.on_line("filters");
        console.on_line("nonsense");

        let screen = console.render();
        assert!(screen.contains("● connected"));
        assert!(screen.contains("1 malformed"));
        assert!(screen.contains("Whitelist [clean]"));
        assert!(screen.contains("unknown command"));
    }
}
