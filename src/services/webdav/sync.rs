use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinError;
use tracing::{debug, error, info, Instrument};

use crate::errors::{DirectoryError, MirrorError, SyncError, TransferError};
use crate::models::{
    DownloadTask, FailureRecord, SyncReport, TransferOutcome, TransferStatus, WorkItem,
};
use crate::run_context::RunContext;
use super::common::local_name_for;
use super::discovery::WebDAVDiscovery;
use super::failure_ledger::{FailureBatch, FailureLedger};
use super::path_filter::PathFilter;
use super::transfer::FileTransfer;

type BatchId = usize;

/// A queued item plus the directory batch its outcome belongs to
struct Scheduled {
    batch: Option<BatchId>,
    item: WorkItem,
}

enum Completed {
    Directory {
        remote_path: String,
        result: Result<Result<Vec<WorkItem>, DirectoryError>, JoinError>,
    },
    File {
        batch: Option<BatchId>,
        task: DownloadTask,
        result: Result<TransferOutcome, JoinError>,
    },
}

/// Failures of one directory listing, waiting for the rest of its files
struct PendingBatch {
    failures: FailureBatch,
    remaining: usize,
}

impl PendingBatch {
    /// Account for one finished file; true once every file has reported
    fn complete(&mut self, failure: Option<FailureRecord>) -> bool {
        if let Some(record) = failure {
            self.failures.push(record);
        }
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

/// Walks a remote tree and mirrors it with one bounded pool for the whole run.
///
/// Directories and files share a single queue. Listing a directory queues its
/// children; at most `worker_budget` items run at once, whatever the depth or
/// breadth of the tree. Sibling subtrees proceed concurrently.
pub struct SyncScheduler {
    discovery: Arc<WebDAVDiscovery>,
    transfer: Arc<FileTransfer>,
    ledger: Arc<FailureLedger>,
    context: Arc<RunContext>,
}

impl SyncScheduler {
    pub fn new(
        discovery: Arc<WebDAVDiscovery>,
        transfer: Arc<FileTransfer>,
        ledger: Arc<FailureLedger>,
        context: Arc<RunContext>,
    ) -> Self {
        Self {
            discovery,
            transfer,
            ledger,
            context,
        }
    }

    /// Mirror `remote_root` into `local_root`.
    ///
    /// Per-file failures land in the ledger and the report. A directory that
    /// cannot be listed or created aborts its own subtree only; the rest of the
    /// tree still runs, and the run then ends with `SyncError::Incomplete`.
    pub async fn run(
        &self,
        remote_root: &str,
        local_root: &Path,
        filter: Arc<PathFilter>,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            run_id: self.context.run_id,
            job_id: self.context.job_id.clone(),
            node_name: self.context.node_name.clone(),
            remote_root: remote_root.to_string(),
            local_root: local_root.to_path_buf(),
            base_dir: filter.base_dir().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            directories_listed: 0,
            files_downloaded: 0,
            files_skipped: 0,
            files_failed: 0,
            bytes_written: 0,
            failed_paths: Vec::new(),
            ledger_path: self.ledger.path().to_path_buf(),
        };

        info!(
            "[{}] Mirroring {} into {} with {} workers",
            self.context.run_id,
            remote_root,
            local_root.display(),
            self.context.worker_budget
        );

        let mut queue = VecDeque::from([Scheduled {
            batch: None,
            item: WorkItem::Directory {
                remote_path: remote_root.to_string(),
                local_path: local_root.to_path_buf(),
            },
        }]);
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Completed>> = FuturesUnordered::new();
        let mut batches: HashMap<BatchId, PendingBatch> = HashMap::new();
        let mut next_batch: BatchId = 0;
        let mut directory_failures: Vec<DirectoryError> = Vec::new();

        loop {
            while in_flight.len() < self.context.worker_budget {
                let Some(scheduled) = queue.pop_front() else { break };
                in_flight.push(self.dispatch(scheduled, &filter));
            }

            let Some(completed) = in_flight.next().await else { break };

            match completed {
                Completed::Directory { remote_path, result } => {
                    let result = result.unwrap_or_else(|join_error| {
                        Err(DirectoryError::Aborted {
                            directory: remote_path.clone(),
                            reason: join_error.to_string(),
                        })
                    });

                    match result {
                        Ok(children) => {
                            report.directories_listed += 1;
                            let file_count = children
                                .iter()
                                .filter(|child| matches!(child, WorkItem::File(_)))
                                .count();
                            debug!(
                                "Listed {}: {} files, {} subdirectories",
                                remote_path,
                                file_count,
                                children.len() - file_count
                            );

                            let batch = next_batch;
                            next_batch += 1;
                            if file_count > 0 {
                                batches.insert(
                                    batch,
                                    PendingBatch {
                                        failures: FailureBatch::new(remote_path),
                                        remaining: file_count,
                                    },
                                );
                            }
                            queue.extend(children.into_iter().map(|item| Scheduled {
                                batch: Some(batch),
                                item,
                            }));
                        }
                        Err(e) => {
                            error!(
                                code = e.error_code(),
                                "Error mirroring directory {}: {}", remote_path, e
                            );
                            directory_failures.push(e);
                        }
                    }
                }
                Completed::File { batch, task, result } => {
                    let outcome = result.unwrap_or_else(|join_error| {
                        error!("Error downloading {}: {}", task.local_path.display(), join_error);
                        TransferOutcome {
                            remote_path: task.remote_path.clone(),
                            local_path: task.local_path.clone(),
                            status: TransferStatus::Failed,
                            bytes_written: 0,
                            expected_size: None,
                            error: Some(TransferError::Aborted {
                                path: task.local_path.clone(),
                                reason: join_error.to_string(),
                            }),
                        }
                    });

                    report.record_outcome(&outcome);
                    let failure = failure_record(&outcome);
                    if let Some(ref record) = failure {
                        report.record_failure(record);
                    }

                    match batch.and_then(|id| batches.get_mut(&id).map(|pending| (id, pending))) {
                        Some((id, pending)) => {
                            if pending.complete(failure) {
                                if let Some(done) = batches.remove(&id) {
                                    self.flush_batch(done.failures, &mut directory_failures).await;
                                }
                            }
                        }
                        None => {
                            // Orphaned file result; persist it on its own
                            if let Some(record) = failure {
                                let mut single = FailureBatch::new(task.remote_path.clone());
                                single.push(record);
                                self.flush_batch(single, &mut directory_failures).await;
                            }
                        }
                    }
                }
            }
        }

        report.finished_at = Some(Utc::now());

        if report.has_failures() {
            error!(
                "[{}] Finished with {} failed downloads ({} downloaded, {} already complete); ledger: {}",
                self.context.run_id,
                report.files_failed,
                report.files_downloaded,
                report.files_skipped,
                report.ledger_path.display()
            );
        } else {
            info!(
                "[{}] Finished: {} downloaded, {} already complete, {} directories",
                self.context.run_id, report.files_downloaded, report.files_skipped, report.directories_listed
            );
        }

        if directory_failures.is_empty() {
            Ok(report)
        } else {
            Err(SyncError::Incomplete {
                failures: directory_failures,
                report: Box::new(report),
            })
        }
    }

    fn dispatch(&self, scheduled: Scheduled, filter: &Arc<PathFilter>) -> BoxFuture<'static, Completed> {
        let Scheduled { batch, item } = scheduled;

        match item {
            WorkItem::Directory { remote_path, local_path } => {
                let discovery = self.discovery.clone();
                let filter = filter.clone();
                let directory = remote_path.clone();
                let handle = tokio::spawn(
                    process_directory(discovery, filter, remote_path, local_path).in_current_span(),
                );
                async move {
                    Completed::Directory {
                        remote_path: directory,
                        result: handle.await,
                    }
                }
                .boxed()
            }
            WorkItem::File(task) => {
                let transfer = self.transfer.clone();
                let spawned_task = task.clone();
                let handle = tokio::spawn(
                    async move { transfer.download_file(&spawned_task).await }.in_current_span(),
                );
                async move {
                    Completed::File {
                        batch,
                        task,
                        result: handle.await,
                    }
                }
                .boxed()
            }
        }
    }

    async fn flush_batch(&self, batch: FailureBatch, directory_failures: &mut Vec<DirectoryError>) {
        let directory = batch.directory().to_string();
        if let Err(source) = batch.flush(&self.ledger).await {
            error!(
                "Failed to record failures for {} in {}: {}",
                directory,
                self.ledger.path().display(),
                source
            );
            directory_failures.push(DirectoryError::LedgerWrite {
                directory,
                path: self.ledger.path().to_path_buf(),
                source,
            });
        }
    }
}

fn failure_record(outcome: &TransferOutcome) -> Option<FailureRecord> {
    if outcome.is_success() {
        return None;
    }
    Some(FailureRecord {
        local_path: outcome.local_path.clone(),
        remote_path: outcome.remote_path.clone(),
        reason: outcome
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Create the local directory, list the remote one and turn its entries into work
async fn process_directory(
    discovery: Arc<WebDAVDiscovery>,
    filter: Arc<PathFilter>,
    remote_path: String,
    local_path: PathBuf,
) -> Result<Vec<WorkItem>, DirectoryError> {
    fs::create_dir_all(&local_path)
        .await
        .map_err(|source| DirectoryError::LocalSetup {
            path: local_path.clone(),
            source,
        })?;

    let entries = discovery.list_directory(&remote_path).await?;

    // The first entry is the directory itself
    let mut children = Vec::new();
    for entry in entries.into_iter().skip(1) {
        let Some(relative) = filter.filter(&entry.href) else {
            debug!("Skipping entry outside {}: {}", filter.base_dir(), entry.href);
            continue;
        };
        if relative == remote_path {
            continue;
        }
        let Some(name) = local_name_for(&relative) else {
            debug!("Skipping entry without a usable local name: {}", relative);
            continue;
        };

        let child_local = local_path.join(name);
        if relative.ends_with('/') {
            children.push(WorkItem::Directory {
                remote_path: relative,
                local_path: child_local,
            });
        } else {
            children.push(WorkItem::File(DownloadTask::new(relative, child_local)));
        }
    }

    Ok(children)
}
