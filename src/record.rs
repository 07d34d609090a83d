use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::state::{DownloadId, DownloadState};
use crate::worker::{TransferContext, TransferWorker};

/// The live half of a started download.
struct WorkerHandle {
    cancel: CancellationToken,
    // Dropping the handle detaches the task; it still runs to its terminal event.
    _task: JoinHandle<()>,
}

/// One user-requested transfer: fixed identity plus lifecycle state.
pub struct DownloadRecord {
    id: DownloadId,
    url: String,
    destination: PathBuf,
    state: DownloadState,
    percent: u8,
    error: Option<String>,
    worker: Option<WorkerHandle>,
}

impl DownloadRecord {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: DownloadId::new(),
            url: url.into(),
            destination: destination.into(),
            state: DownloadState::Idle,
            percent: 0,
            error: None,
            worker: None,
        }
    }

    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Last reported percent; 100 once finished.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Launch the transfer. Must be called from within a tokio runtime.
    ///
    /// Returns `false` without doing anything unless the record is idle.
    pub fn start(&mut self, ctx: &TransferContext) -> bool {
        if self.state != DownloadState::Idle {
            return false;
        }

        let cancel = CancellationToken::new();
        let worker = TransferWorker::new(
            self.id,
            self.url.clone(),
            self.destination.clone(),
            cancel.clone(),
            ctx.clone(),
        );
        let task = tokio::spawn(worker.run());

        self.worker = Some(WorkerHandle {
            cancel,
            _task: task,
        });
        self.state = DownloadState::Running;
        debug!(id = %self.id, "download started");
        true
    }

    /// Ask the worker to stop at its next chunk boundary. Never blocks.
    ///
    /// Returns `false` unless the record is running.
    pub fn request_interrupt(&mut self) -> bool {
        if self.state != DownloadState::Running {
            return false;
        }
        let Some(worker) = &self.worker else {
            return false;
        };
        worker.cancel.cancel();
        self.state = DownloadState::Interrupting;
        debug!(id = %self.id, "interrupt requested");
        true
    }

    pub fn on_progress(&mut self, id: DownloadId, percent: u8) -> bool {
        if id != self.id || !self.state.is_active() {
            return false;
        }
        self.percent = self.percent.max(percent.min(100));
        true
    }

    pub fn on_finished(&mut self, id: DownloadId) -> bool {
        if id != self.id || !self.state.is_active() {
            return false;
        }
        self.state = DownloadState::Finished;
        self.percent = 100;
        self.worker = None;
        debug!(id = %self.id, "download finished");
        true
    }

    pub fn on_error(&mut self, id: DownloadId, message: &str) -> bool {
        if id != self.id || !self.state.is_active() {
            return false;
        }
        self.state = DownloadState::Errored;
        self.error = Some(message.to_string());
        self.worker = None;
        debug!(id = %self.id, error = message, "download errored");
        true
    }
}

impl std::fmt::Debug for DownloadRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRecord")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("percent", &self.percent)
            .field("error", &self.error)
            .finish()
    }
}
