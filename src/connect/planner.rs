//! The connection planner — one printer's side of the cloud link.
//!
//! The planner is a pull-driven state machine. Whenever the transport is
//! ready to do work it asks [`Planner::next_action`] what to do — send the
//! pending event, send telemetry, or sleep — performs the action, and
//! reports back through [`Planner::action_done`]. Commands decoded from a
//! telemetry response, background G-code completion, and download completion
//! push back in through their own entry points. Everything runs on one
//! logical task; nothing here suspends or locks.
//!
//! ```text
//!  ┌────────────┐  next_action()   ┌─────────────┐
//!  │ transport  │ ───────────────▶ │   Planner   │──▶ PrinterPort
//!  │   driver   │ ◀─────────────── │             │──▶ DownloadPort
//!  └────────────┘  Event/Telemetry │             │──▶ TransferMonitorPort
//!        │            /Sleep       └─────────────┘
//!        └── action_done / command / background_done / download_done
//! ```
//!
//! The one subtlety worth keeping in mind: the planner distinguishes what is
//! true *now* from what the server last *heard*. A planned event survives
//! until the server confirms it, change trackers stay dirty until their Info
//! is acknowledged, and a terminated transfer is reported by comparing the
//! monitor's current id against the last one the planner observed.

use core::fmt::Write as _;

use log::{debug, info, warn};

use crate::time::{since, Duration, Timestamp};

use super::changes::ChangeTracker;
use super::command::{
    BackgroundCommand, BackgroundGcode, Command, CommandData, CommandId, HASH_MAX,
};
use super::event::{Event, EventKind};
use super::ports::{
    Download, DownloadPort, DownloadRequest, DownloadStart, JobControl, PrinterPort,
    TransferId, TransferMonitorPort, TransferOutcome, FINGERPRINT_HDR_SIZE,
};

// A note about time comparisons. We usually subtract now() and some past
// event, getting the length of the interval. This works fine around
// wrap-around (the subtraction underflows to the low-ish real number of
// milliseconds). Our intervals are small: if we do not talk to the server
// for long enough we schedule an introduction Info event and reset the
// relevant time values, so no interval is ever examined once it could have
// grown weird.

/// First retry after 100 ms.
pub const COOLDOWN_BASE: Duration = 100;
/// Don't retry less often than once a minute.
pub const COOLDOWN_MAX: Duration = 60 * 1000;
/// Telemetry cadence while printing or running a background command.
pub const TELEMETRY_INTERVAL_SHORT: Duration = 1000;
/// Telemetry cadence when idle.
pub const TELEMETRY_INTERVAL_LONG: Duration = 4 * 1000;
/// Silence long enough to warrant re-introducing ourselves to the server.
pub const RECONNECT_AFTER: Duration = 10 * 1000;
/// Attempts per specific event before it is thrown out of the window. The
/// failure may be tied to that exact event (an oversized payload, say, which
/// we cannot tell apart from a network error), and retrying it forever would
/// wedge the whole link.
pub const GIVE_UP_AFTER_ATTEMPTS: u8 = 5;

const DOWNLOAD_URL_PREFIX: &str = "/p/teams/";
const DOWNLOAD_URL_INFIX: &str = "/files/";
const DOWNLOAD_URL_SUFFIX: &str = "/raw";
/// Decimal width reserved for a 64-bit team id.
const TEAM_ID_DIGITS: usize = 21;
/// Capacity of a composed download URL path, from its component sizes.
pub const DOWNLOAD_URL_MAX: usize = DOWNLOAD_URL_PREFIX.len()
    + TEAM_ID_DIGITS
    + DOWNLOAD_URL_INFIX.len()
    + HASH_MAX
    + DOWNLOAD_URL_SUFFIX.len();

/// A path may be served iff it lives on the USB drive and never climbs out
/// of it.
pub fn path_allowed(path: &str) -> bool {
    let on_usb = path == "/usb" || path.starts_with("/usb/");
    on_usb && !path.contains("/../")
}

/// What the transport should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Transmit this event.
    Event(Event),
    /// Transmit a telemetry snapshot (the server may answer with a command).
    SendTelemetry,
    Sleep(Sleep),
}

/// A pause, plus what may run during it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sleep {
    pub duration: Duration,
    /// The background G-code command may be advanced during this sleep.
    /// Never set while an event waits for transmission — executing G-code
    /// could plan a fresh event that would overwrite the pending one.
    pub background: bool,
    /// A download is in flight. Its terminal event is generated passively by
    /// watching the transfer monitor, so downloading never needs to pause.
    pub download: bool,
}

/// Outcome of one performed action, reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    /// Delivered and acknowledged.
    Ok,
    /// Delivered, but the server turned it down. The event is dropped just
    /// like on success; resending it would change nothing.
    Refused,
    /// Not delivered (network trouble, timeout, server error).
    Failed,
}

/// Outcome of a background G-code command, reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundResult {
    Success,
    Failure,
}

/// The planner proper. One per printer-server link.
pub struct Planner<'buf> {
    /// The next outbound event, pending until the server confirms it.
    planned_event: Option<Event>,
    /// When telemetry was last sent successfully.
    last_telemetry: Option<Timestamp>,
    /// When any action last succeeded.
    last_success: Option<Timestamp>,
    /// Current backoff, doubled on every failure.
    cooldown: Option<Duration>,
    /// The next action should be the backoff sleep.
    perform_cooldown: bool,
    /// Consecutive failures for the same pending action.
    failed_attempts: u8,
    info_changes: ChangeTracker,
    file_changes: ChangeTracker,
    background_command: Option<BackgroundCommand<'buf>>,
    download: Option<Download>,
    /// Transfer id the planner last saw in the monitor; an edge against the
    /// current id means a transfer terminated (or started).
    observed_transfer: Option<TransferId>,
    /// Command that started the running transfer, echoed in its terminal
    /// event.
    transfer_start_cmd: Option<CommandId>,
}

impl Default for Planner<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'buf> Planner<'buf> {
    pub fn new() -> Self {
        Self {
            planned_event: None,
            last_telemetry: None,
            last_success: None,
            cooldown: None,
            perform_cooldown: false,
            failed_attempts: 0,
            info_changes: ChangeTracker::new(),
            file_changes: ChangeTracker::new(),
            background_command: None,
            download: None,
            observed_transfer: None,
            transfer_start_cmd: None,
        }
    }

    /// Forget the session state after the transport re-established the
    /// connection. Triggers an Info event on the next action.
    pub fn reset(&mut self) {
        self.info_changes.mark_dirty();
        self.last_telemetry = None;
        self.cooldown = None;
        self.perform_cooldown = false;
        self.failed_attempts = 0;
    }

    /// Decide the next action. Does not consume the pending event — only a
    /// confirmed send does that.
    pub fn next_action(
        &mut self,
        now: Timestamp,
        printer: &impl PrinterPort,
        transfers: &impl TransferMonitorPort,
    ) -> Action {
        if self.perform_cooldown {
            self.perform_cooldown = false;
            debug_assert!(self.cooldown.is_some());
            let amount = self.cooldown.unwrap_or(COOLDOWN_BASE);
            return self.sleep(amount);
        }

        if let Some(event) = &self.planned_event {
            return Action::Event(event.clone());
        }

        // Probe both trackers; a files-only change must still get its rescan
        // flag even when the info fingerprint moved in the same tick.
        let info_changed = self.info_changes.set_hash(printer.info_fingerprint());
        let files_changed = self.file_changes.set_hash(printer.files_hash());
        if info_changed || files_changed {
            let mut event = Event::new(EventKind::Info);
            if self.file_changes.is_dirty() {
                event.info_rescan_files = true;
            }
            self.planned_event = Some(event.clone());
            return Action::Event(event);
        }

        let current_transfer = transfers.id();
        if self.observed_transfer != current_transfer {
            let terminated_transfer = self.observed_transfer;
            self.observed_transfer = current_transfer;

            let outcome = terminated_transfer.and_then(|id| transfers.outcome(id));
            if let Some(outcome) = outcome {
                let kind = match outcome {
                    TransferOutcome::Finished => EventKind::TransferFinished,
                    TransferOutcome::Error => EventKind::TransferAborted,
                    TransferOutcome::Stopped => EventKind::TransferStopped,
                };
                let mut event = Event::new(kind);
                // Not None, otherwise there would be no outcome.
                event.transfer_id = terminated_transfer;
                event.start_cmd_id = self.transfer_start_cmd.take();
                self.planned_event = Some(event.clone());
                return Action::Event(event);
            }
            // No outcome: it aged out of the history, or there was no
            // previous transfer and we are changing from None.
        }

        match since(now, self.last_telemetry) {
            Some(since_telemetry) => {
                let interval = if printer.is_printing() || self.background_command.is_some() {
                    TELEMETRY_INTERVAL_SHORT
                } else {
                    TELEMETRY_INTERVAL_LONG
                };
                if since_telemetry >= interval {
                    Action::SendTelemetry
                } else {
                    self.sleep(interval - since_telemetry)
                }
            }
            // Never sent telemetry yet (or an event just forced a refresh).
            None => Action::SendTelemetry,
        }
    }

    /// The transport finished (or failed) the action it was handed.
    pub fn action_done(&mut self, result: ActionResult, now: Timestamp) {
        match result {
            // A refusal still proves the server heard us; the event is
            // dropped either way since resending it would change nothing.
            ActionResult::Ok | ActionResult::Refused => {
                self.last_success = Some(now);
                self.perform_cooldown = false;
                self.cooldown = None;
                self.failed_attempts = 0;
                if let Some(event) = self.planned_event.take() {
                    if event.kind == EventKind::Info {
                        self.info_changes.mark_clean();
                        if event.info_rescan_files {
                            self.file_changes.mark_clean();
                        }
                    }
                    // Telemetry right away — the server may hand us a new
                    // command with its response.
                    self.last_telemetry = None;
                } else {
                    self.last_telemetry = Some(now);
                }
            }
            ActionResult::Failed => {
                self.failed_attempts += 1;
                if self.failed_attempts >= GIVE_UP_AFTER_ATTEMPTS {
                    // Info is how the session reinitializes; it is the one
                    // event never given up on.
                    let drop_event = self
                        .planned_event
                        .as_ref()
                        .is_some_and(|event| event.kind != EventKind::Info);
                    if drop_event {
                        if let Some(event) = self.planned_event.take() {
                            warn!(
                                "giving up on {} after {} attempts",
                                event.kind.as_str(),
                                GIVE_UP_AFTER_ATTEMPTS
                            );
                        }
                    }
                    self.failed_attempts = 0;
                }

                let out_of_touch =
                    since(now, self.last_success).map_or(true, |gap| gap >= RECONNECT_AFTER);
                if out_of_touch && self.planned_event.is_none() {
                    // The server has not heard from us for a long time; once
                    // we get through again, start over with an introduction.
                    info!("link silent too long, scheduling a fresh Info");
                    self.planned_event = Some(Event::new(EventKind::Info));
                    self.last_success = None;
                }

                self.cooldown = Some(
                    COOLDOWN_MAX.min(self.cooldown.unwrap_or(COOLDOWN_BASE / 2).saturating_mul(2)),
                );
                self.perform_cooldown = true;
            }
        }
    }

    /// Feed in a command decoded from a telemetry response.
    pub fn command(
        &mut self,
        command: Command<'buf>,
        printer: &mut impl PrinterPort,
        downloads: &mut impl DownloadPort,
    ) {
        // Commands only arrive as the answer to a telemetry; an event still
        // in flight at that point is a protocol error in the driver.
        debug_assert!(self.planned_event.is_none());

        if self.background_command.is_some() {
            // Busy with a previous command. That same command being re-sent
            // is re-accepted; anything else has to wait its turn.
            let kind = if matches!(command.data, CommandData::ProcessingThisCommand) {
                EventKind::Accepted
            } else {
                EventKind::Rejected
            };
            self.planned_event = Some(Event::with_command(kind, command.id));
            return;
        }

        match command.data {
            CommandData::Unknown => self.reject(command.id, "Unknown command"),
            CommandData::Broken { reason } => self.reject(command.id, reason),
            CommandData::GcodeTooLarge => self.reject(command.id, "GCode too large"),
            CommandData::ProcessingOther => self.reject(command.id, "Processing other command"),
            CommandData::ProcessingThisCommand => {
                // The parser only produces this while the background slot is
                // occupied, which was handled above.
                debug_assert!(false, "ProcessingThisCommand with an empty background slot");
                self.planned_event = Some(Event::with_command(EventKind::Rejected, command.id));
            }
            CommandData::Gcode(gcode) => {
                self.background_command = Some(BackgroundCommand {
                    id: command.id,
                    gcode: BackgroundGcode::new(gcode),
                });
                self.planned_event = Some(Event::accepted(command.id));
            }
            CommandData::PausePrint => {
                self.job_control(command.id, printer, JobControl::Pause, "No print to pause")
            }
            CommandData::ResumePrint => self.job_control(
                command.id,
                printer,
                JobControl::Resume,
                "No paused print to resume",
            ),
            CommandData::StopPrint => {
                self.job_control(command.id, printer, JobControl::Stop, "No print to stop")
            }
            CommandData::StartPrint { path } => {
                let refusal = if !path_allowed(&path) {
                    Some("Forbidden path")
                } else if !printer.file_exists(&path) {
                    Some("File not found")
                } else if !printer.start_print(&path) {
                    Some("Can't print now")
                } else {
                    None
                };
                match refusal {
                    None => self.planned_event = Some(Event::finished(command.id)),
                    Some(reason) => self.reject(command.id, reason),
                }
            }
            CommandData::SetPrinterReady => {
                if printer.set_ready(true) {
                    self.planned_event = Some(Event::finished(command.id));
                } else {
                    self.reject(command.id, "Can't set ready now");
                }
            }
            CommandData::CancelPrinterReady => {
                // Setting _not_ ready can't fail.
                let ok = printer.set_ready(false);
                debug_assert!(ok);
                self.planned_event = Some(Event::finished(command.id));
            }
            CommandData::SendInfo => {
                self.planned_event = Some(Event::with_command(EventKind::Info, command.id));
            }
            CommandData::SendJobInfo { job_id } => {
                let mut event = Event::with_command(EventKind::JobInfo, command.id);
                event.job_id = Some(job_id);
                self.planned_event = Some(event);
            }
            CommandData::SendFileInfo { path } => {
                if path_allowed(&path) {
                    let mut event = Event::with_command(EventKind::FileInfo, command.id);
                    event.path = Some(path);
                    self.planned_event = Some(event);
                } else {
                    self.reject(command.id, "Forbidden path");
                }
            }
            CommandData::SendTransferInfo => {
                let mut event = Event::with_command(EventKind::TransferInfo, command.id);
                event.start_cmd_id = self.transfer_start_cmd;
                self.planned_event = Some(event);
            }
            CommandData::StartConnectDownload { team, hash, path } => {
                self.start_download(command.id, team, &hash, &path, printer, downloads);
            }
        }
    }

    /// Id of the command occupying the background slot, if any. The parser
    /// uses this to tell a re-sent duplicate from a colliding command.
    pub fn background_command_id(&self) -> Option<CommandId> {
        self.background_command.as_ref().map(|command| command.id)
    }

    /// Access the background G-code for execution during a sleep. Refused
    /// while an event is pending: running G-code can plan a fresh event, and
    /// the pending one must flush first.
    pub fn background_gcode(&mut self) -> Option<&mut BackgroundGcode<'buf>> {
        if self.planned_event.is_some() {
            return None;
        }
        self.background_command
            .as_mut()
            .map(|command| &mut command.gcode)
    }

    /// The executor finished the background command.
    pub fn background_done(&mut self, result: BackgroundResult) {
        // The command is only handed out during sleeps, and only while no
        // event waits for transmission.
        debug_assert!(self.planned_event.is_none());
        let Some(command) = self.background_command.take() else {
            debug_assert!(false, "background_done with an empty background slot");
            return;
        };
        let kind = match result {
            BackgroundResult::Success => EventKind::Finished,
            BackgroundResult::Failure => EventKind::Failed,
        };
        self.planned_event = Some(Event::with_command(kind, command.id));
    }

    /// The transfer engine finished with the download (either way). The
    /// terminal event is *not* planned here — `next_action` synthesizes it
    /// when the monitor's id moves off the finished transfer. This entry
    /// point only pins down which id that is, in case no `next_action`
    /// happened while the slot was still held.
    pub fn download_done(&mut self, transfers: &impl TransferMonitorPort) {
        debug_assert!(self.download.is_some());
        self.observed_transfer = transfers.id();
        // The download still holds the slot, so the monitor must know it.
        debug_assert!(self.observed_transfer.is_some());
        self.download = None;
    }

    // ── Internal ──────────────────────────────────────────────

    fn sleep(&self, duration: Duration) -> Action {
        let has_event = self.planned_event.is_some();
        Action::Sleep(Sleep {
            duration,
            background: self.background_command.is_some() && !has_event,
            download: self.download.is_some(),
        })
    }

    fn reject(&mut self, command_id: CommandId, reason: &'static str) {
        debug!("rejecting command {}: {}", command_id, reason);
        self.planned_event = Some(Event::rejected(command_id, reason));
    }

    fn job_control(
        &mut self,
        command_id: CommandId,
        printer: &mut impl PrinterPort,
        operation: JobControl,
        refusal: &'static str,
    ) {
        if printer.job_control(operation) {
            self.planned_event = Some(Event::finished(command_id));
        } else {
            self.reject(command_id, refusal);
        }
    }

    fn start_download(
        &mut self,
        command_id: CommandId,
        team: u64,
        hash: &str,
        dest_path: &str,
        printer: &mut impl PrinterPort,
        downloads: &mut impl DownloadPort,
    ) {
        // Peek at the config without clearing its changed flag.
        let (config, config_changed) = printer.config(false);
        if config_changed {
            // A changed config means this command may come from the previous
            // server; following it could leak the token to the new one or
            // pull a file from the wrong origin. Better safe than sorry.
            return self.reject(command_id, "Switching config");
        }

        if config.tls {
            // Downloads run over a plaintext side connection; sending the
            // token there would undo the TLS on the main one. Refused until
            // encrypted downloads exist.
            return self.reject(command_id, "Encryption of downloads not supported");
        }

        let mut url_path: heapless::String<DOWNLOAD_URL_MAX> = heapless::String::new();
        if write!(
            url_path,
            "{}{}{}{}{}",
            DOWNLOAD_URL_PREFIX, team, DOWNLOAD_URL_INFIX, hash, DOWNLOAD_URL_SUFFIX
        )
        .is_err()
        {
            // Capacity is computed from the component sizes; overflowing it
            // means that estimate is wrong.
            debug_assert!(false, "download url capacity miscalculated");
            return self.reject(command_id, "Failed to download");
        }

        let printer_info = printer.printer_info();
        let request = DownloadRequest {
            host: &config.host,
            port: config.port,
            url_path: &url_path,
            dest_path,
            token: &config.token,
            fingerprint: &printer_info.fingerprint[..FINGERPRINT_HDR_SIZE],
        };

        match downloads.start_connect_download(request) {
            DownloadStart::Started(download) => {
                // Another in-flight download would not have acquired the
                // transfer slot.
                debug_assert!(self.download.is_none());
                info!("download {} started by command {}", download.id(), command_id);
                self.download = Some(download);
                self.transfer_start_cmd = Some(command_id);
                self.planned_event = Some(Event::finished(command_id));
            }
            DownloadStart::NoTransferSlot => {
                self.reject(command_id, "Another transfer in progress")
            }
            DownloadStart::AlreadyExists => self.reject(command_id, "File already exists"),
            DownloadStart::RefusedRequest => self.reject(command_id, "Failed to download"),
            DownloadStart::Storage { msg } => self.reject(command_id, msg),
        }
    }
}
