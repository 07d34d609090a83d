//! Ordered collection of downloads and the hub their events pass through.
//!
//! The registry owns every record and the receiving end of the event channel
//! all workers send on. Record state is only ever touched from here, either by
//! a control call (`start_all`, `interrupt`, ...) or by routing a worker event
//! in [`DownloadRegistry::next_event`], so no locking is needed.

use std::path::PathBuf;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::{debug, info};

use crate::config::TransferConfig;
use crate::event::{DownloadEvent, EventSink};
use crate::record::DownloadRecord;
use crate::state::{DownloadId, DownloadState};
use crate::worker::TransferContext;

pub struct DownloadRegistry {
    records: Vec<DownloadRecord>,
    ctx: TransferContext,
    events: UnboundedReceiver<DownloadEvent>,
}

impl DownloadRegistry {
    pub fn new(config: TransferConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            records: Vec::new(),
            ctx: TransferContext::new(&config, tx),
            events: rx,
        }
    }

    /// Append a new idle download. Does not start it.
    pub fn add(&mut self, url: impl Into<String>, destination: impl Into<PathBuf>) -> DownloadId {
        let record = DownloadRecord::new(url, destination);
        let id = record.id();
        debug!(%id, url = record.url(), "download added");
        self.records.push(record);
        id
    }

    /// Start every idle download. Returns how many were started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_all(&mut self) -> usize {
        let ctx = &self.ctx;
        let started = self
            .records
            .iter_mut()
            .filter(|r| r.state() == DownloadState::Idle)
            .map(|r| r.start(ctx))
            .filter(|started| *started)
            .count();
        if started > 0 {
            info!(started, "downloads started");
        }
        started
    }

    /// Request interruption of a single running download.
    pub fn interrupt(&mut self, id: DownloadId) -> bool {
        self.get_mut(id).is_some_and(|r| r.request_interrupt())
    }

    /// Request interruption of every running download. Returns how many were asked.
    pub fn interrupt_all(&mut self) -> usize {
        let interrupted = self
            .records
            .iter_mut()
            .filter(|r| r.state() == DownloadState::Running)
            .map(|r| r.request_interrupt())
            .filter(|asked| *asked)
            .count();
        if interrupted > 0 {
            info!(interrupted, "interrupt requested");
        }
        interrupted
    }

    /// Interrupt everything still running, then drop every record.
    ///
    /// Workers of removed records are detached: they still clean up their
    /// partial files, but their events no longer match any record and are
    /// discarded. Confirmation is the caller's business.
    pub fn clear(&mut self) -> usize {
        self.interrupt_all();
        let removed = self.records.len();
        self.records.clear();
        info!(removed, "download list cleared");
        removed
    }

    pub fn get(&self, id: DownloadId) -> Option<&DownloadRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    fn get_mut(&mut self, id: DownloadId) -> Option<&mut DownloadRecord> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn state(&self, id: DownloadId) -> Option<DownloadState> {
        self.get(id).map(DownloadRecord::state)
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &DownloadRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Some download has a worker that has not reported its outcome yet.
    pub fn has_active(&self) -> bool {
        self.records.iter().any(|r| r.state().is_active())
    }

    /// Wait for the next worker event, apply it to its record and return it.
    ///
    /// Returns `None` when nothing is buffered and no download is active, i.e.
    /// when waiting could never produce another event for a known record.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) if self.has_active() => self.events.recv().await?,
                Err(_) => return None,
            };
            if self.route(&event) {
                return Some(event);
            }
        }
    }

    /// Relay one event to `sink`. Returns `false` once idle.
    pub async fn relay<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        match self.next_event().await {
            Some(event) => {
                sink.deliver(&event);
                true
            }
            None => false,
        }
    }

    /// Relay events to `sink` until no download is active.
    pub async fn drain<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        while self.relay(sink).await {}
    }

    fn route(&mut self, event: &DownloadEvent) -> bool {
        let id = event.id();
        let Some(record) = self.get_mut(id) else {
            debug!(%id, "dropping event for unknown download");
            return false;
        };
        let accepted = match event {
            DownloadEvent::Progress { id, percent } => record.on_progress(*id, *percent),
            DownloadEvent::Finished { id } => record.on_finished(*id),
            DownloadEvent::Error { id, message } => record.on_error(*id, message),
        };
        if !accepted {
            debug!(%id, ?event, "record rejected event");
        }
        accepted
    }
}

impl Default for DownloadRegistry {
    fn default() -> Self {
        Self::new(TransferConfig::default())
    }
}
