use std::path::PathBuf;
use thiserror::Error;

use super::{ErrorScope, ListingError, MirrorError};
use crate::models::SyncReport;

/// The base-directory pattern could not be compiled
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid base directory pattern for '{base_dir}': {source}")]
    InvalidPattern {
        base_dir: String,
        #[source]
        source: regex::Error,
    },

    #[error("Base directory must not be empty")]
    EmptyBaseDir,
}

impl MirrorError for FilterError {
    fn scope(&self) -> ErrorScope {
        ErrorScope::Run
    }

    fn error_code(&self) -> &'static str {
        match self {
            FilterError::InvalidPattern { .. } => "FILTER_INVALID_PATTERN",
            FilterError::EmptyBaseDir => "FILTER_EMPTY_BASE_DIR",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        Some("Check the configured base directory".to_string())
    }
}

/// Structural failure of one directory; aborts that subtree only
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("Failed to create local directory {path}: {source}")]
    LocalSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append failures for {directory} to ledger {path}: {source}")]
    LedgerWrite {
        directory: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory task for {directory} aborted: {reason}")]
    Aborted { directory: String, reason: String },
}

impl MirrorError for DirectoryError {
    fn scope(&self) -> ErrorScope {
        ErrorScope::Directory
    }

    fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::Listing(e) => e.error_code(),
            DirectoryError::LocalSetup { .. } => "DIRECTORY_LOCAL_SETUP_FAILED",
            DirectoryError::LedgerWrite { .. } => "DIRECTORY_LEDGER_WRITE_FAILED",
            DirectoryError::Aborted { .. } => "DIRECTORY_TASK_ABORTED",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            DirectoryError::Listing(e) => e.suggested_action(),
            DirectoryError::LocalSetup { .. } | DirectoryError::LedgerWrite { .. } => {
                Some("Check free space and permissions on the destination volume".to_string())
            }
            DirectoryError::Aborted { .. } => None,
        }
    }
}

/// Errors returned to whoever started the run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Mirror run incomplete: {} director{} failed", failures.len(), if failures.len() == 1 { "y" } else { "ies" })]
    Incomplete {
        failures: Vec<DirectoryError>,
        report: Box<SyncReport>,
    },
}

impl SyncError {
    /// Report of the work that did complete, when the run got that far
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncError::Incomplete { report, .. } => Some(report),
            SyncError::Filter(_) => None,
        }
    }
}

impl MirrorError for SyncError {
    fn scope(&self) -> ErrorScope {
        match self {
            SyncError::Filter(_) => ErrorScope::Run,
            SyncError::Incomplete { .. } => ErrorScope::Directory,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SyncError::Filter(e) => e.error_code(),
            SyncError::Incomplete { .. } => "SYNC_INCOMPLETE",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            SyncError::Filter(e) => e.suggested_action(),
            SyncError::Incomplete { failures, .. } => failures.iter().find_map(|f| f.suggested_action()),
        }
    }
}
