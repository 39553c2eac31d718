//! Port traits — the boundary between the connection core and the printer.
//!
//! ```text
//!   transport driver ──▶ Planner ──▶ PrinterPort        (printer control)
//!                              └───▶ DownloadPort       (transfer engine)
//!                              └───▶ TransferMonitorPort (transfer history)
//! ```
//!
//! Driven adapters implement these traits; the planner consumes them via
//! `impl Trait` parameters at each call site, so the core never touches the
//! printer firmware or the network directly and the whole state machine runs
//! against mocks in tests.

use crate::config::ConnectConfig;

/// Bytes in a printer identity fingerprint.
pub const FINGERPRINT_SIZE: usize = 50;

/// Leading slice of the fingerprint presented when opening a download
/// connection.
pub const FINGERPRINT_HDR_SIZE: usize = 16;

/// Identity data of this printer, as reported to the server.
#[derive(Debug, Clone)]
pub struct PrinterInfo {
    pub fingerprint: [u8; FINGERPRINT_SIZE],
}

/// Job-control operations the server may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    Pause,
    Resume,
    Stop,
}

/// Read/control surface of the printer the planner drives.
pub trait PrinterPort {
    /// Hash over everything an Info event would report. A changed hash means
    /// the server's picture of the printer is stale.
    fn info_fingerprint(&self) -> u32;

    /// Hash over the file listing on attached storage.
    fn files_hash(&self) -> u32;

    fn is_printing(&self) -> bool;

    /// Pause/resume/stop the current job. False when there is no job in a
    /// state the operation applies to.
    fn job_control(&mut self, operation: JobControl) -> bool;

    /// Start printing the given file. False when the printer cannot accept a
    /// job right now.
    fn start_print(&mut self, path: &str) -> bool;

    /// Mark the printer ready (or not) for remote jobs. Only `true` may be
    /// refused.
    fn set_ready(&mut self, ready: bool) -> bool;

    /// Connection config snapshot plus its "changed since last look" flag.
    /// The flag is cleared only when `reset_changed` is set.
    fn config(&mut self, reset_changed: bool) -> (ConnectConfig, bool);

    fn printer_info(&self) -> PrinterInfo;

    /// Whether `path` names an existing file on attached storage.
    fn file_exists(&self, path: &str) -> bool;
}

/// Identifier of one transfer, unique within the monitor's history.
pub type TransferId = u32;

/// How a finished transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Finished,
    Error,
    Stopped,
}

/// Read-only view of the transfer engine's single slot and bounded history.
pub trait TransferMonitorPort {
    /// Id of the transfer currently holding the slot.
    fn id(&self) -> Option<TransferId>;

    /// Terminal outcome of a past transfer. `None` once it ages out of the
    /// history.
    fn outcome(&self, id: TransferId) -> Option<TransferOutcome>;
}

/// Ownership token for the transfer slot. Handed out by the engine when a
/// download starts; the planner keeps it until the engine reports
/// completion.
#[derive(Debug)]
pub struct Download {
    id: TransferId,
}

impl Download {
    pub fn new(id: TransferId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }
}

/// Everything the engine needs to open a download connection.
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub url_path: &'a str,
    /// Where the file lands on attached storage.
    pub dest_path: &'a str,
    pub token: &'a str,
    /// Fingerprint header presented to the server.
    pub fingerprint: &'a [u8],
}

/// Result of asking the engine to start a download.
#[derive(Debug)]
pub enum DownloadStart {
    Started(Download),
    /// The single transfer slot is occupied.
    NoTransferSlot,
    /// Destination file already exists.
    AlreadyExists,
    /// Server refused the request.
    RefusedRequest,
    /// Storage-layer trouble, with the engine's own wording.
    Storage { msg: &'static str },
}

/// Write surface of the transfer engine.
pub trait DownloadPort {
    fn start_connect_download(&mut self, request: DownloadRequest<'_>) -> DownloadStart;
}
