//! Outbound events to the server.
//!
//! An [`Event`] is one message the printer wants the server to hear. The
//! planner keeps at most one pending at a time and the transport serializes
//! it; the reason strings below are part of the wire contract and must stay
//! byte-for-byte stable.

use super::command::{CommandId, FilePath, JobId};
use super::ports::TransferId;

/// Kinds of events, mirroring the server-side protocol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Session (re)establishment: full printer description.
    Info,
    Accepted,
    Rejected,
    JobInfo,
    FileInfo,
    TransferInfo,
    Finished,
    Failed,
    TransferStopped,
    TransferAborted,
    TransferFinished,
}

impl EventKind {
    /// Protocol name, for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::JobInfo => "JOB_INFO",
            Self::FileInfo => "FILE_INFO",
            Self::TransferInfo => "TRANSFER_INFO",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::TransferStopped => "TRANSFER_STOPPED",
            Self::TransferAborted => "TRANSFER_ABORTED",
            Self::TransferFinished => "TRANSFER_FINISHED",
        }
    }
}

/// One outbound event with its optional attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Id of the command this event answers, if any.
    pub command_id: Option<CommandId>,
    pub job_id: Option<JobId>,
    pub transfer_id: Option<TransferId>,
    pub path: Option<FilePath>,
    /// Stable ASCII literal explaining a rejection.
    pub reason: Option<&'static str>,
    /// Ask the server to rescan our file listing along with this Info.
    pub info_rescan_files: bool,
    /// For transfer events: the command that originally started the transfer.
    pub start_cmd_id: Option<CommandId>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            command_id: None,
            job_id: None,
            transfer_id: None,
            path: None,
            reason: None,
            info_rescan_files: false,
            start_cmd_id: None,
        }
    }

    pub fn with_command(kind: EventKind, command_id: CommandId) -> Self {
        Self {
            command_id: Some(command_id),
            ..Self::new(kind)
        }
    }

    pub fn accepted(command_id: CommandId) -> Self {
        Self::with_command(EventKind::Accepted, command_id)
    }

    pub fn finished(command_id: CommandId) -> Self {
        Self::with_command(EventKind::Finished, command_id)
    }

    pub fn rejected(command_id: CommandId, reason: &'static str) -> Self {
        Self {
            reason: Some(reason),
            ..Self::with_command(EventKind::Rejected, command_id)
        }
    }
}
