use thiserror::Error;

use super::{ErrorScope, MirrorError};

/// Errors raised while assembling the run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required credentials: {}. Provide either direct parameters or environment variables: WEBDAV_URL, WEBDAV_USERNAME, WEBDAV_PASSWORD", missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid worker budget '{value}': must be a positive integer")]
    InvalidWorkerBudget { value: String },
}

impl MirrorError for ConfigError {
    fn scope(&self) -> ErrorScope {
        ErrorScope::Run
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::MissingCredentials { .. } => "CONFIG_MISSING_CREDENTIALS",
            ConfigError::InvalidUrl { .. } => "CONFIG_INVALID_URL",
            ConfigError::InvalidWorkerBudget { .. } => "CONFIG_INVALID_WORKER_BUDGET",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            ConfigError::MissingCredentials { .. } => {
                Some("Export WEBDAV_URL, WEBDAV_USERNAME and WEBDAV_PASSWORD or pass them as flags".to_string())
            }
            ConfigError::InvalidUrl { .. } => Some("Server URL must start with http:// or https://".to_string()),
            ConfigError::InvalidWorkerBudget { .. } => None,
        }
    }
}
