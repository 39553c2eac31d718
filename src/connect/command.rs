//! Inbound commands from the server.
//!
//! Commands arrive piggy-backed on a successful telemetry exchange and are
//! decoded by the transport layer into the closed [`CommandData`] sum.
//! Parse trouble is itself a variant (`Unknown`, `Broken`, …) so the planner
//! can answer every command id the server hands out, even the ones it could
//! not make sense of.
//!
//! A G-code command's payload is not copied: it stays in the shared scratch
//! buffer and the command carries the exclusive [`BufferBorrow`] into it.
//! The borrow travels into the [`BackgroundCommand`] and is released only
//! when that command finishes, which is what keeps the parser from reusing
//! the scratch area mid-execution.

use crate::buffer::BufferBorrow;

/// Server-assigned command id, echoed back in every event it provokes.
pub type CommandId = u32;

/// Print-job identifier as known to the server.
pub type JobId = u16;

/// Longest accepted file path.
pub const PATH_MAX: usize = 96;

/// Longest accepted file hash (as sent in a download command).
pub const HASH_MAX: usize = 40;

pub type FilePath = heapless::String<PATH_MAX>;
pub type FileHash = heapless::String<HASH_MAX>;

/// One decoded command: the server's id plus the payload variant.
#[derive(Debug)]
pub struct Command<'buf> {
    pub id: CommandId,
    pub data: CommandData<'buf>,
}

/// Everything the server can ask for, including the ways a command can fail
/// to parse.
#[derive(Debug)]
pub enum CommandData<'buf> {
    /// Parsed fine, but the command type is not one we know.
    Unknown,
    /// Structurally invalid; the parser supplies the complaint.
    Broken { reason: &'static str },
    /// G-code payload does not fit the scratch buffer.
    GcodeTooLarge,
    /// Arrived while a different command holds the background slot.
    ProcessingOther,
    /// Re-sent id of the command currently in the background slot.
    ProcessingThisCommand,
    /// Run G-code in the background, over many planner ticks.
    Gcode(GcodeData<'buf>),
    StartPrint { path: FilePath },
    PausePrint,
    ResumePrint,
    StopPrint,
    SetPrinterReady,
    CancelPrinterReady,
    SendInfo,
    SendJobInfo { job_id: JobId },
    SendFileInfo { path: FilePath },
    SendTransferInfo,
    StartConnectDownload {
        team: u64,
        hash: FileHash,
        path: FilePath,
    },
}

/// G-code payload sitting in the shared scratch buffer.
#[derive(Debug)]
pub struct GcodeData<'buf> {
    pub data: BufferBorrow<'buf>,
    /// Bytes of the buffer actually occupied by the payload.
    pub size: usize,
}

/// The single in-flight background command.
#[derive(Debug)]
pub struct BackgroundCommand<'buf> {
    pub id: CommandId,
    pub gcode: BackgroundGcode<'buf>,
}

/// Execution progress of a background G-code payload.
///
/// The transport advances this during sleeps: take [`remaining`], feed some
/// of it to the printer, [`advance`] by what was consumed.
///
/// [`remaining`]: BackgroundGcode::remaining
/// [`advance`]: BackgroundGcode::advance
#[derive(Debug)]
pub struct BackgroundGcode<'buf> {
    data: BufferBorrow<'buf>,
    size: usize,
    position: usize,
}

impl<'buf> BackgroundGcode<'buf> {
    pub fn new(payload: GcodeData<'buf>) -> Self {
        Self {
            data: payload.data,
            size: payload.size,
            position: 0,
        }
    }

    /// Bytes not yet fed to the printer.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.position..self.size]
    }

    /// Consume `amount` bytes. Saturates at the end of the payload.
    pub fn advance(&mut self, amount: usize) {
        self.position = (self.position + amount).min(self.size);
    }

    pub fn is_done(&self) -> bool {
        self.position >= self.size
    }
}
