use std::path::PathBuf;
use thiserror::Error;

use super::{ErrorScope, MirrorError, TransportError};

/// Errors scoped to a single file transfer.
///
/// These never propagate out of `FileTransfer::download_file`; they are folded
/// into a `TransferOutcome` and end up in the failure ledger.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Stream interrupted while downloading {remote_path}: {source}")]
    Stream {
        remote_path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Downloaded file size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download task for {path} aborted: {reason}")]
    Aborted { path: PathBuf, reason: String },
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

impl MirrorError for TransferError {
    fn scope(&self) -> ErrorScope {
        ErrorScope::File
    }

    fn error_code(&self) -> &'static str {
        match self {
            TransferError::Transport(e) => e.error_code(),
            TransferError::Stream { .. } => "TRANSFER_STREAM_INTERRUPTED",
            TransferError::SizeMismatch { .. } => "TRANSFER_SIZE_MISMATCH",
            TransferError::Io { .. } => "TRANSFER_IO_FAILED",
            TransferError::Aborted { .. } => "TRANSFER_ABORTED",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            TransferError::Transport(e) => e.suggested_action(),
            TransferError::SizeMismatch { .. } | TransferError::Stream { .. } => {
                Some("Re-run the mirror; complete files are skipped".to_string())
            }
            _ => None,
        }
    }
}
