use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::errors::{EngineError, ListingError, SyncError};
use crate::models::{DownloadTask, RemoteEntry, SyncReport, TransferOutcome};
use crate::run_context::RunContext;

use super::config::{RetryConfig, WebDAVConfig};
use super::connection::WebDAVConnection;
use super::discovery::WebDAVDiscovery;
use super::failure_ledger::FailureLedger;
use super::path_filter::PathFilter;
use super::sync::SyncScheduler;
use super::transfer::FileTransfer;

/// Main entry point that wires the connection, lister, transfer and ledger
/// for one run
pub struct WebDAVMirrorService {
    context: Arc<RunContext>,
    connection: Arc<WebDAVConnection>,
    discovery: Arc<WebDAVDiscovery>,
    transfer: Arc<FileTransfer>,
    ledger: Arc<FailureLedger>,
    scheduler: SyncScheduler,
}

impl WebDAVMirrorService {
    /// Creates a mirror service with the default retry policy
    pub fn new(config: WebDAVConfig, context: RunContext, ledger_dir: &Path) -> Result<Self, EngineError> {
        Self::new_with_retry(config, RetryConfig::default(), context, ledger_dir)
    }

    /// Creates a mirror service with a custom retry policy
    pub fn new_with_retry(
        config: WebDAVConfig,
        retry_config: RetryConfig,
        context: RunContext,
        ledger_dir: &Path,
    ) -> Result<Self, EngineError> {
        let context = Arc::new(context);
        let connection = Arc::new(WebDAVConnection::new(
            config,
            retry_config,
            context.connection_pool_size(),
        )?);
        let discovery = Arc::new(WebDAVDiscovery::new(connection.clone()));
        let transfer = Arc::new(FileTransfer::new(connection.clone(), context.clone()));
        let ledger = Arc::new(FailureLedger::for_run(ledger_dir, &context));
        let scheduler = SyncScheduler::new(
            discovery.clone(),
            transfer.clone(),
            ledger.clone(),
            context.clone(),
        );

        Ok(Self {
            context,
            connection,
            discovery,
            transfer,
            ledger,
            scheduler,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Self::new(config.webdav.clone(), config.run.clone(), &config.ledger_dir)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn connection(&self) -> &WebDAVConnection {
        &self.connection
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger.path().to_path_buf()
    }

    pub async fn list_directory(&self, remote_path: &str) -> Result<Vec<RemoteEntry>, ListingError> {
        self.discovery.list_directory(remote_path).await
    }

    /// Transfer a single file; failures are reported in the outcome, not raised
    pub async fn download_file(&self, remote_path: &str, local_path: &Path) -> TransferOutcome {
        self.transfer
            .download_file(&DownloadTask::new(remote_path, local_path))
            .await
    }

    /// Mirror `remote_folder` into `local_folder`, keeping only entries under
    /// `/<base_dir>`
    pub async fn download_folder(
        &self,
        remote_folder: &str,
        local_folder: &Path,
        base_dir: &str,
    ) -> Result<SyncReport, SyncError> {
        let filter = Arc::new(PathFilter::new(base_dir)?);
        let span = info_span!(
            "mirror",
            node = %self.context.node_name,
            job = %self.context.job_id
        );

        async {
            info!("Starting download of {} into {}", remote_folder, local_folder.display());
            self.scheduler.run(remote_folder, local_folder, filter).await
        }
        .instrument(span)
        .await
    }
}
