use reqwest::header::CONTENT_LENGTH;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::errors::TransferError;
use crate::models::{DownloadTask, TransferOutcome, TransferStatus};
use crate::run_context::RunContext;
use super::connection::WebDAVConnection;

/// Files above this size get periodic progress lines
pub const PROGRESS_MIN_FILE_BYTES: u64 = 100 * 1024 * 1024;
/// Distance between two progress lines
pub const PROGRESS_INTERVAL_BYTES: u64 = 50 * 1024 * 1024;

const BYTES_PER_GB: f64 = (1024 * 1024 * 1024) as f64;

fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Decides when a running download deserves a progress line
#[derive(Debug)]
pub struct TransferProgress {
    total: Option<u64>,
    next_report: u64,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            next_report: PROGRESS_INTERVAL_BYTES,
        }
    }

    /// Percentage to report once `downloaded` crosses the next interval mark
    pub fn record(&mut self, downloaded: u64) -> Option<f64> {
        let total = self.total.filter(|t| *t > PROGRESS_MIN_FILE_BYTES)?;
        if downloaded < self.next_report {
            return None;
        }
        while self.next_report <= downloaded {
            self.next_report += PROGRESS_INTERVAL_BYTES;
        }
        Some(downloaded as f64 / total as f64 * 100.0)
    }
}

/// Streams single remote files to disk through a run-scoped temporary name
pub struct FileTransfer {
    connection: Arc<WebDAVConnection>,
    context: Arc<RunContext>,
}

impl FileTransfer {
    pub fn new(connection: Arc<WebDAVConnection>, context: Arc<RunContext>) -> Self {
        Self { connection, context }
    }

    /// Downloads one file.
    ///
    /// Never returns an error: every failure is folded into the outcome and any
    /// temporary file is removed. On success the final path holds exactly
    /// `Content-Length` bytes.
    pub async fn download_file(&self, task: &DownloadTask) -> TransferOutcome {
        let temp_path = self.context.temp_path_for(&task.local_path);
        let mut expected_size = None;
        let mut bytes_written = 0;

        let result = self
            .try_download(task, &temp_path, &mut expected_size, &mut bytes_written)
            .await;

        match result {
            Ok(status) => TransferOutcome {
                remote_path: task.remote_path.clone(),
                local_path: task.local_path.clone(),
                status,
                bytes_written,
                expected_size,
                error: None,
            },
            Err(e) => {
                error!("Failed to download {}: {}", task.remote_path, e);
                Self::discard_temp(&temp_path).await;
                TransferOutcome {
                    remote_path: task.remote_path.clone(),
                    local_path: task.local_path.clone(),
                    status: TransferStatus::Failed,
                    bytes_written,
                    expected_size,
                    error: Some(e),
                }
            }
        }
    }

    async fn try_download(
        &self,
        task: &DownloadTask,
        temp_path: &Path,
        expected_size: &mut Option<u64>,
        bytes_written: &mut u64,
    ) -> Result<TransferStatus, TransferError> {
        let mut response = self.connection.get(&task.remote_path).await?;

        let file_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        *expected_size = file_size;
        let size_gb = gigabytes(file_size.unwrap_or(0));
        let local_path = &task.local_path;

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }

        if let Some(expected) = file_size {
            if let Ok(metadata) = fs::metadata(local_path).await {
                if metadata.is_file() && metadata.len() == expected {
                    info!(
                        "File already exists and complete: {} ({:.2} GB)",
                        local_path.display(),
                        size_gb
                    );
                    return Ok(TransferStatus::Skipped);
                }
            }
        }

        info!("Starting download of {} (Total size: {:.2} GB)", local_path.display(), size_gb);

        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| TransferError::io(temp_path, e))?;
        let mut progress = TransferProgress::new(file_size);

        loop {
            let chunk = response.chunk().await.map_err(|source| TransferError::Stream {
                remote_path: task.remote_path.clone(),
                source,
            })?;
            let Some(chunk) = chunk else { break };
            if chunk.is_empty() {
                continue;
            }

            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(temp_path, e))?;
            *bytes_written += chunk.len() as u64;

            if let Some(percent) = progress.record(*bytes_written) {
                info!(
                    "Downloading {}: {:.1}% ({:.2} GB of {:.2} GB)",
                    local_path.display(),
                    percent,
                    gigabytes(*bytes_written),
                    size_gb
                );
            }
        }

        file.flush().await.map_err(|e| TransferError::io(temp_path, e))?;
        file.sync_all().await.map_err(|e| TransferError::io(temp_path, e))?;
        drop(file);

        let actual = fs::metadata(temp_path)
            .await
            .map_err(|e| TransferError::io(temp_path, e))?
            .len();
        match file_size {
            Some(expected) if actual != expected => {
                return Err(TransferError::SizeMismatch {
                    path: local_path.clone(),
                    expected,
                    actual,
                });
            }
            None => debug!(
                "No Content-Length for {}, accepting {} bytes unverified",
                task.remote_path, actual
            ),
            _ => {}
        }

        fs::rename(temp_path, local_path)
            .await
            .map_err(|e| TransferError::io(local_path, e))?;

        info!("Completed: {} ({:.2} GB)", local_path.display(), gigabytes(actual));
        Ok(TransferStatus::Downloaded)
    }

    async fn discard_temp(temp_path: &Path) {
        match fs::remove_file(temp_path).await {
            Ok(()) => debug!("Removed temporary file {}", temp_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temporary file {}: {}", temp_path.display(), e),
        }
    }
}
