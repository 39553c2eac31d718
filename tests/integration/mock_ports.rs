//! Mock port implementations for integration tests.
//!
//! Record every call so tests can assert on the full interaction history
//! without a real printer or download engine behind them.

use std::collections::HashMap;

use printlink::config::ConnectConfig;
use printlink::connect::ports::{
    Download, DownloadPort, DownloadRequest, DownloadStart, JobControl, PrinterInfo, PrinterPort,
    TransferId, TransferMonitorPort, TransferOutcome, FINGERPRINT_SIZE,
};

// ── MockPrinter ───────────────────────────────────────────────

pub struct MockPrinter {
    pub info_hash: u32,
    pub files_hash: u32,
    pub printing: bool,
    pub job_control_ok: bool,
    pub start_print_ok: bool,
    pub set_ready_ok: bool,
    pub existing_files: Vec<String>,
    pub config: ConnectConfig,
    pub config_changed: bool,
    pub job_calls: Vec<JobControl>,
    pub started_prints: Vec<String>,
}

impl MockPrinter {
    pub fn new() -> Self {
        Self {
            info_hash: 0xA11CE,
            files_hash: 0xF11E5,
            printing: false,
            job_control_ok: true,
            start_print_ok: true,
            set_ready_ok: true,
            existing_files: Vec::new(),
            config: ConnectConfig {
                host: heapless::String::try_from("connect.example.com").unwrap(),
                port: 8080,
                token: heapless::String::try_from("tok-123").unwrap(),
                tls: false,
            },
            config_changed: false,
            job_calls: Vec::new(),
            started_prints: Vec::new(),
        }
    }
}

impl Default for MockPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterPort for MockPrinter {
    fn info_fingerprint(&self) -> u32 {
        self.info_hash
    }

    fn files_hash(&self) -> u32 {
        self.files_hash
    }

    fn is_printing(&self) -> bool {
        self.printing
    }

    fn job_control(&mut self, operation: JobControl) -> bool {
        self.job_calls.push(operation);
        self.job_control_ok
    }

    fn start_print(&mut self, path: &str) -> bool {
        if self.start_print_ok {
            self.started_prints.push(path.to_string());
        }
        self.start_print_ok
    }

    fn set_ready(&mut self, ready: bool) -> bool {
        !ready || self.set_ready_ok
    }

    fn config(&mut self, reset_changed: bool) -> (ConnectConfig, bool) {
        let changed = self.config_changed;
        if reset_changed {
            self.config_changed = false;
        }
        (self.config.clone(), changed)
    }

    fn printer_info(&self) -> PrinterInfo {
        PrinterInfo {
            fingerprint: [0x42; FINGERPRINT_SIZE],
        }
    }

    fn file_exists(&self, path: &str) -> bool {
        self.existing_files.iter().any(|known| known == path)
    }
}

// ── MockTransfers ─────────────────────────────────────────────

/// What the mock engine answers to the next start request.
pub enum StartBehavior {
    Started(TransferId),
    NoSlot,
    Exists,
    Refused,
    Storage(&'static str),
}

/// One recorded download request, with everything owned.
pub struct RecordedRequest {
    pub host: String,
    pub port: u16,
    pub url_path: String,
    pub dest_path: String,
    pub token: String,
    pub fingerprint: Vec<u8>,
}

pub struct MockTransfers {
    pub current: Option<TransferId>,
    pub outcomes: HashMap<TransferId, TransferOutcome>,
    pub behavior: StartBehavior,
    pub requests: Vec<RecordedRequest>,
}

impl MockTransfers {
    pub fn new() -> Self {
        Self {
            current: None,
            outcomes: HashMap::new(),
            behavior: StartBehavior::Refused,
            requests: Vec::new(),
        }
    }
}

impl Default for MockTransfers {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferMonitorPort for MockTransfers {
    fn id(&self) -> Option<TransferId> {
        self.current
    }

    fn outcome(&self, id: TransferId) -> Option<TransferOutcome> {
        self.outcomes.get(&id).copied()
    }
}

impl DownloadPort for MockTransfers {
    fn start_connect_download(&mut self, request: DownloadRequest<'_>) -> DownloadStart {
        self.requests.push(RecordedRequest {
            host: request.host.to_string(),
            port: request.port,
            url_path: request.url_path.to_string(),
            dest_path: request.dest_path.to_string(),
            token: request.token.to_string(),
            fingerprint: request.fingerprint.to_vec(),
        });
        match self.behavior {
            StartBehavior::Started(id) => {
                self.current = Some(id);
                DownloadStart::Started(Download::new(id))
            }
            StartBehavior::NoSlot => DownloadStart::NoTransferSlot,
            StartBehavior::Exists => DownloadStart::AlreadyExists,
            StartBehavior::Refused => DownloadStart::RefusedRequest,
            StartBehavior::Storage(msg) => DownloadStart::Storage { msg },
        }
    }
}
