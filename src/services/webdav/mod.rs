// WebDAV mirror modules organized by functionality

pub mod common;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod failure_ledger;
pub mod path_filter;
pub mod service;
pub mod sync;
pub mod transfer;

// Re-export main types for convenience
pub use config::{RetryConfig, WebDAVConfig};
pub use connection::WebDAVConnection;
pub use discovery::WebDAVDiscovery;
pub use failure_ledger::{FailureBatch, FailureLedger};
pub use path_filter::PathFilter;
pub use service::WebDAVMirrorService;
pub use sync::SyncScheduler;
pub use transfer::{FileTransfer, TransferProgress};
