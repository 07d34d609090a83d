use std::path::PathBuf;
use thiserror::Error;

use crate::event::INTERRUPTED_MESSAGE;

/// Why a transfer ended without completing.
///
/// Only `Interrupted` removes the destination file. An `Io` failure halfway
/// through leaves whatever was written so far on disk.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Connection, TLS, non-success status or body read failure.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", INTERRUPTED_MESSAGE)]
    Interrupted,
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
