//! Concurrent HTTP downloads, each on its own task, individually cancellable,
//! reporting progress and outcome through a typed event channel.

pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod registry;
pub mod state;
pub mod utils;
pub mod worker;

pub use config::TransferConfig;
pub use error::TransferError;
pub use event::{DownloadEvent, EventSink, INTERRUPTED_MESSAGE};
pub use record::DownloadRecord;
pub use registry::DownloadRegistry;
pub use state::{DownloadId, DownloadState};
