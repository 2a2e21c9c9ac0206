use thiserror::Error;

use super::{ErrorScope, MirrorError};

/// Errors surfaced by the retrying HTTP layer once its attempts are exhausted
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    Request {
        method: String,
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        method: String,
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },
}

impl TransportError {
    /// HTTP status of the final attempt, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            TransportError::InvalidMethod { .. } => None,
        }
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            TransportError::Request { attempts, .. } | TransportError::Status { attempts, .. } => *attempts,
            TransportError::InvalidMethod { .. } => 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Request { source, .. } if source.is_timeout())
    }
}

impl MirrorError for TransportError {
    fn scope(&self) -> ErrorScope {
        // The caller decides: a listing turns it into a directory error, a
        // download into a failure record.
        ErrorScope::File
    }

    fn error_code(&self) -> &'static str {
        match self {
            TransportError::Request { source, .. } if source.is_timeout() => "TRANSPORT_TIMEOUT",
            TransportError::Request { source, .. } if source.is_connect() => "TRANSPORT_CONNECT_FAILED",
            TransportError::Request { .. } => "TRANSPORT_REQUEST_FAILED",
            TransportError::Status { .. } => "TRANSPORT_HTTP_STATUS",
            TransportError::InvalidMethod { .. } => "TRANSPORT_INVALID_METHOD",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self.status() {
            Some(401) => Some("Check WEBDAV_USERNAME and WEBDAV_PASSWORD".to_string()),
            Some(403) => Some("Verify the account has read access to this path".to_string()),
            Some(404) => Some("Verify WEBDAV_URL points at the collection root".to_string()),
            Some(405) => Some("The endpoint does not accept WebDAV methods; check the server URL".to_string()),
            _ => None,
        }
    }
}

/// Errors raised while listing a remote collection
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to list directory {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to list directory {path}: expected 207 Multi-Status, got HTTP {status}")]
    UnexpectedStatus { path: String, status: u16 },

    #[error("Failed to read listing body for {path}: {source}")]
    Body {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed Multi-Status response for {path}: {reason}")]
    MalformedResponse { path: String, reason: String },
}

impl ListingError {
    pub fn path(&self) -> &str {
        match self {
            ListingError::Transport { path, .. }
            | ListingError::UnexpectedStatus { path, .. }
            | ListingError::Body { path, .. }
            | ListingError::MalformedResponse { path, .. } => path,
        }
    }
}

impl MirrorError for ListingError {
    fn scope(&self) -> ErrorScope {
        ErrorScope::Directory
    }

    fn error_code(&self) -> &'static str {
        match self {
            ListingError::Transport { .. } => "LISTING_TRANSPORT_FAILED",
            ListingError::UnexpectedStatus { .. } => "LISTING_UNEXPECTED_STATUS",
            ListingError::Body { .. } => "LISTING_BODY_FAILED",
            ListingError::MalformedResponse { .. } => "LISTING_MALFORMED_RESPONSE",
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            ListingError::Transport { source, .. } => source.suggested_action(),
            ListingError::UnexpectedStatus { .. } => {
                Some("The server did not answer PROPFIND with Multi-Status; is WebDAV enabled?".to_string())
            }
            _ => None,
        }
    }
}
