use std::time::Duration;

use crate::errors::ConfigError;

/// WebDAV server configuration
#[derive(Debug, Clone)]
pub struct WebDAVConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Total timeout for one PROPFIND request
    pub listing_timeout_seconds: u64,
    /// Timeout between reads while streaming a download
    pub download_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

/// Retry configuration for GET and PROPFIND requests
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Relative jitter applied to every delay (0.1 = ±10%)
    pub jitter: f64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000, // 1 second
            max_delay_ms: 60000,    // 60 seconds
            backoff_multiplier: 2.0,
            jitter: 0.1,
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Whether a response status should be retried
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (0-based), given a jitter sample in `[-1.0, 1.0]`.
    ///
    /// delay = initial * multiplier^attempt * (1 + jitter * sample), capped at `max_delay_ms`
    pub fn backoff_delay(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponential = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let jittered = exponential * (1.0 + self.jitter * jitter_sample.clamp(-1.0, 1.0));
        let capped = jittered.max(0.0).min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

impl WebDAVConfig {
    /// Creates a new WebDAV configuration
    pub fn new(server_url: String, username: String, password: String) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            username,
            password,
            listing_timeout_seconds: 30,
            download_timeout_seconds: 60,
            connect_timeout_seconds: 30,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.server_url.is_empty() {
            missing.push("WEBDAV_URL");
        }
        if self.username.is_empty() {
            missing.push("WEBDAV_USERNAME");
        }
        if self.password.is_empty() {
            missing.push("WEBDAV_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials { missing });
        }

        let parsed = url::Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: self.server_url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(())
    }

    /// Full request URL for a remote path: the base URL followed by the path as-is
    pub fn url_for_path(&self, remote_path: &str) -> String {
        let base = self.server_url.trim_end_matches('/');
        if remote_path.starts_with('/') {
            format!("{}{}", base, remote_path)
        } else {
            format!("{}/{}", base, remote_path)
        }
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
