use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::TransferError;

/// A raw `href` as returned by a directory listing.
///
/// Collections are conventionally suffixed with `/`. Entries carry no identity
/// beyond their path and are produced fresh by every listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub href: String,
}

impl RemoteEntry {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }

    pub fn is_collection(&self) -> bool {
        self.href.ends_with('/')
    }
}

impl From<String> for RemoteEntry {
    fn from(href: String) -> Self {
        Self { href }
    }
}

/// One remote file paired with its resolved local destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub remote_path: String,
    pub local_path: PathBuf,
}

impl DownloadTask {
    pub fn new(remote_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
        }
    }
}

/// A unit of work on the run-wide queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// List a remote collection and queue its children
    Directory { remote_path: String, local_path: PathBuf },
    /// Transfer one file
    File(DownloadTask),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Body streamed, verified and committed to the final path
    Downloaded,
    /// A complete copy was already present; no body was read
    Skipped,
    Failed,
}

/// Result of one `FileTransfer::download_file` call
#[derive(Debug)]
pub struct TransferOutcome {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub status: TransferStatus,
    pub bytes_written: u64,
    /// `Content-Length` of the GET; `None` when the server did not send one
    pub expected_size: Option<u64>,
    pub error: Option<TransferError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, TransferStatus::Failed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, TransferStatus::Skipped)
    }
}

/// A transfer that did not complete during this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub reason: String,
}

impl FailureRecord {
    /// The line written to the failure ledger
    pub fn ledger_line(&self) -> String {
        self.local_path.display().to_string()
    }
}

/// Summary of one mirror run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub job_id: String,
    pub node_name: String,
    pub remote_root: String,
    pub local_root: PathBuf,
    pub base_dir: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub directories_listed: usize,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub bytes_written: u64,
    pub failed_paths: Vec<PathBuf>,
    pub ledger_path: PathBuf,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    pub(crate) fn record_outcome(&mut self, outcome: &TransferOutcome) {
        match outcome.status {
            TransferStatus::Downloaded => {
                self.files_downloaded += 1;
                self.bytes_written += outcome.bytes_written;
            }
            TransferStatus::Skipped => self.files_skipped += 1,
            TransferStatus::Failed => {}
        }
    }

    pub(crate) fn record_failure(&mut self, record: &FailureRecord) {
        self.files_failed += 1;
        self.failed_paths.push(record.local_path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_entry_collection_detection() {
        assert!(RemoteEntry::new("/data/sub/").is_collection());
        assert!(!RemoteEntry::new("/data/a.txt").is_collection());
    }

    #[test]
    fn test_failed_outcome_is_not_success() {
        let outcome = TransferOutcome {
            remote_path: "/data/a.txt".to_string(),
            local_path: PathBuf::from("out/a.txt"),
            status: TransferStatus::Failed,
            bytes_written: 0,
            expected_size: Some(10),
            error: None,
        };
        assert!(!outcome.is_success());
        assert!(!outcome.is_skipped());
    }

    #[test]
    fn test_ledger_line_is_local_path() {
        let record = FailureRecord {
            local_path: PathBuf::from("/scratch/out/a.txt"),
            remote_path: "/data/a.txt".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(record.ledger_line(), "/scratch/out/a.txt");
    }
}
