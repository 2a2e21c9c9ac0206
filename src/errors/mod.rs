use thiserror::Error;

pub mod config;
pub mod sync;
pub mod transfer;
pub mod transport;

pub use config::ConfigError;
pub use sync::{DirectoryError, FilterError, SyncError};
pub use transfer::TransferError;
pub use transport::{ListingError, TransportError};

/// How far an error reaches once it is raised.
///
/// File-scoped errors are recovered into a failure record, directory-scoped
/// errors abort that subtree, run-scoped errors stop the whole mirror run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    File,
    Directory,
    Run,
}

/// Common trait for all custom error types in the crate
pub trait MirrorError: std::error::Error + Send + Sync + 'static {
    /// Get the scope this error is allowed to abort
    fn scope(&self) -> ErrorScope;

    /// Get a stable error code for logs and the JSON report
    fn error_code(&self) -> &'static str;

    /// Get optional suggested action for the operator
    fn suggested_action(&self) -> Option<String> {
        None
    }
}

/// Error wrapper used at the binary edge when the concrete type is not interesting
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl MirrorError for EngineError {
    fn scope(&self) -> ErrorScope {
        match self {
            EngineError::Config(e) => e.scope(),
            EngineError::Sync(e) => e.scope(),
            EngineError::Client(_) => ErrorScope::Run,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            EngineError::Config(e) => e.error_code(),
            EngineError::Sync(e) => e.error_code(),
            EngineError::Client(_) => "ENGINE_CLIENT_BUILD_FAILED",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            EngineError::Config(e) => e.suggested_action(),
            EngineError::Sync(e) => e.suggested_action(),
            EngineError::Client(_) => None,
        }
    }
}
