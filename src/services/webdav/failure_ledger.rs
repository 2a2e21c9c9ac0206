use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

use crate::models::FailureRecord;
use crate::run_context::RunContext;

/// Run-scoped, append-only list of transfers that did not complete.
///
/// One local path per line. Entries are never deduplicated or removed.
pub struct FailureLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger for `context`'s job inside `directory`
    pub fn for_run(directory: &Path, context: &RunContext) -> Self {
        Self::new(directory.join(context.ledger_file_name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records, flushing after every line
    pub async fn append(&self, records: &[FailureRecord]) -> io::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        for record in records {
            let line = format!("{}\n", record.ledger_line());
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }
        file.sync_data().await?;
        Ok(())
    }

    /// Lines recorded so far; a ledger that was never written is empty
    pub async fn read_entries(&self) -> io::Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Failures collected for one directory listing
#[derive(Debug)]
pub struct FailureBatch {
    directory: String,
    records: Vec<FailureRecord>,
}

impl FailureBatch {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            records: Vec::new(),
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn push(&mut self, record: FailureRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Persist the batch and report it; returns the number of records written
    pub async fn flush(self, ledger: &FailureLedger) -> io::Result<usize> {
        if self.records.is_empty() {
            return Ok(0);
        }

        ledger.append(&self.records).await?;

        let paths: Vec<String> = self.records.iter().map(FailureRecord::ledger_line).collect();
        error!(
            "Failed downloads in {} ({}): {:?}",
            self.directory,
            self.records.len(),
            paths
        );
        Ok(self.records.len())
    }
}
