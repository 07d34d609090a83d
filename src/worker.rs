use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::event::DownloadEvent;
use crate::state::DownloadId;

/// What every worker of a registry shares: the HTTP client, the chunk size
/// and the sending half of the registry's event channel.
#[derive(Clone)]
pub struct TransferContext {
    pub(crate) client: Client,
    pub(crate) chunk_size: usize,
    pub(crate) events: UnboundedSender<DownloadEvent>,
}

impl TransferContext {
    pub fn new(config: &TransferConfig, events: UnboundedSender<DownloadEvent>) -> Self {
        Self {
            client: config.build_client(),
            chunk_size: config.effective_chunk_size(),
            events,
        }
    }
}

/// Streams one URL into one file and reports how it went.
///
/// A worker never returns its outcome. It emits progress events followed by
/// exactly one `Finished` or `Error` event and then stops.
pub struct TransferWorker {
    id: DownloadId,
    url: String,
    destination: PathBuf,
    cancel: CancellationToken,
    ctx: TransferContext,
}

impl TransferWorker {
    pub fn new(
        id: DownloadId,
        url: String,
        destination: PathBuf,
        cancel: CancellationToken,
        ctx: TransferContext,
    ) -> Self {
        Self {
            id,
            url,
            destination,
            cancel,
            ctx,
        }
    }

    pub async fn run(self) {
        let span = tracing::debug_span!("transfer", id = %self.id, url = %self.url);
        async move {
            debug!(destination = %self.destination.display(), "transfer started");
            let terminal = match self.transfer().await {
                Ok(()) => {
                    debug!("transfer complete");
                    DownloadEvent::Finished { id: self.id }
                }
                Err(TransferError::Interrupted) => {
                    self.remove_partial().await;
                    debug!("transfer interrupted");
                    DownloadEvent::Error {
                        id: self.id,
                        message: TransferError::Interrupted.to_string(),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "transfer failed");
                    DownloadEvent::Error {
                        id: self.id,
                        message: e.to_string(),
                    }
                }
            };
            self.emit(terminal);
        }
        .instrument(span)
        .await
    }

    async fn transfer(&self) -> Result<(), TransferError> {
        self.checkpoint()?;

        let response = self
            .ctx
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let declared_total = declared_length(response.headers());

        let mut file = File::create(&self.destination)
            .await
            .map_err(|e| TransferError::io(&self.destination, e))?;

        if declared_total == 0 {
            // Length unknown: one bulk read, no progress, no mid-body cancellation.
            let body = response.bytes().await?;
            self.checkpoint()?;
            file.write_all(&body)
                .await
                .map_err(|e| TransferError::io(&self.destination, e))?;
        } else {
            self.copy_chunked(response.bytes_stream(), &mut file, declared_total)
                .await?;
        }

        file.flush()
            .await
            .map_err(|e| TransferError::io(&self.destination, e))?;
        Ok(())
    }

    /// Write `stream` into `file` in pieces of at most `chunk_size` bytes,
    /// checking for cancellation before each piece and once more at the end.
    async fn copy_chunked<S, B>(
        &self,
        stream: S,
        file: &mut File,
        declared_total: u64,
    ) -> Result<(), TransferError>
    where
        S: Stream<Item = Result<B, reqwest::Error>>,
        B: AsRef<[u8]>,
    {
        futures::pin_mut!(stream);
        let mut progress = Progress::new(declared_total);

        while let Some(item) = stream.next().await {
            let frame = item?;
            for chunk in frame.as_ref().chunks(self.ctx.chunk_size) {
                self.checkpoint()?;
                file.write_all(chunk)
                    .await
                    .map_err(|e| TransferError::io(&self.destination, e))?;
                let percent = progress.advance(chunk.len() as u64);
                self.emit(DownloadEvent::Progress {
                    id: self.id,
                    percent,
                });
            }
        }

        // An interrupt that lands after the last write still beats completion.
        self.checkpoint()
    }

    fn checkpoint(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Best-effort; a failed removal is logged and otherwise ignored.
    async fn remove_partial(&self) {
        match fs::remove_file(&self.destination).await {
            Ok(()) => debug!("removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to remove partial file"),
        }
    }

    fn emit(&self, event: DownloadEvent) {
        if self.ctx.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// `Content-Length` as a number, 0 when absent or unparseable.
fn declared_length(headers: &header::HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Accumulated byte count against the declared total.
struct Progress {
    transferred: u64,
    total: u64,
}

impl Progress {
    fn new(total: u64) -> Self {
        Self {
            transferred: 0,
            total,
        }
    }

    fn advance(&mut self, bytes: u64) -> u8 {
        self.transferred += bytes;
        percent_of(self.transferred, self.total)
    }
}

/// floor(transferred * 100 / total), capped at 100 for bodies longer than declared.
fn percent_of(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (u128::from(transferred) * 100) / u128::from(total);
    percent.min(100) as u8
}
