use rand::Rng;
use reqwest::{Client, Method, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{EngineError, TransportError};
use super::common::build_user_agent;
use super::config::{RetryConfig, WebDAVConfig};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:resourcetype/>
        <D:getcontentlength/>
    </D:prop>
</D:propfind>"#;

/// Authenticated HTTP client with connection pooling and retry
pub struct WebDAVConnection {
    client: Client,
    config: WebDAVConfig,
    retry_config: RetryConfig,
}

impl WebDAVConnection {
    /// Builds the pooled client; `pool_size` is the idle connections kept per host
    pub fn new(config: WebDAVConfig, retry_config: RetryConfig, pool_size: usize) -> Result<Self, EngineError> {
        // Validate configuration first
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.download_timeout())
            .pool_max_idle_per_host(pool_size.max(1))
            .user_agent(build_user_agent())
            .build()?;

        Ok(Self {
            client,
            config,
            retry_config,
        })
    }

    pub fn config(&self) -> &WebDAVConfig {
        &self.config
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Gets the request URL for a remote path
    pub fn url_for_path(&self, remote_path: &str) -> String {
        self.config.url_for_path(remote_path)
    }

    /// PROPFIND with `Depth: 1` against a remote collection
    pub async fn propfind(&self, remote_path: &str) -> Result<Response, TransportError> {
        let method = Method::from_bytes(b"PROPFIND").map_err(|_| TransportError::InvalidMethod {
            method: "PROPFIND".to_string(),
        })?;
        let url = self.url_for_path(remote_path);

        self.authenticated_request(
            method,
            &url,
            Some(PROPFIND_BODY),
            &[("Depth", "1"), ("Content-Type", "application/xml")],
            Some(self.config.listing_timeout()),
        )
        .await
    }

    /// Streaming GET; the body is left unread for the caller
    pub async fn get(&self, remote_path: &str) -> Result<Response, TransportError> {
        let url = self.url_for_path(remote_path);
        self.authenticated_request(Method::GET, &url, None, &[], None).await
    }

    /// Delay before the next attempt, with jitter to break up synchronized retries
    fn retry_delay(&self, retry_index: u32, response: Option<&Response>) -> Duration {
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        let backoff = self.retry_config.backoff_delay(retry_index, sample);

        // Honour Retry-After (seconds form) when the server asks for a longer pause
        let retry_after = response
            .and_then(|r| r.headers().get(reqwest::header::RETRY_AFTER))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(Duration::from_millis(self.retry_config.max_delay_ms)));

        match retry_after {
            Some(server_delay) if server_delay > backoff => server_delay,
            _ => backoff,
        }
    }

    /// Performs an authenticated request, retrying transport failures and
    /// retryable statuses with exponential backoff
    pub async fn authenticated_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&'static str>,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<Response, TransportError> {
        let max_attempts = self.retry_config.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut request = self
                .client
                .request(method.clone(), url)
                .basic_auth(&self.config.username, Some(&self.config.password));

            for (key, value) in headers {
                request = request.header(*key, *value);
            }
            if let Some(body_content) = body {
                request = request.body(body_content);
            }
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            debug!("📤 {} {} (attempt {}/{})", method, url, attempt, max_attempts);
            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!("📥 {} {} -> {}", method, url, status.as_u16());
                        return Ok(response);
                    }

                    if self.retry_config.is_retryable_status(status.as_u16()) && attempt < max_attempts {
                        let delay = self.retry_delay(attempt - 1, Some(&response));
                        warn!(
                            "Server returned {} for {} {}, retrying in {}ms (attempt {}/{})",
                            status,
                            method,
                            url,
                            delay.as_millis(),
                            attempt,
                            max_attempts
                        );
                        sleep(delay).await;
                        continue;
                    }

                    return Err(TransportError::Status {
                        method: method.to_string(),
                        url: url.to_string(),
                        status: status.as_u16(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.retry_delay(attempt - 1, None);
                        warn!(
                            "Request error for {} {}: {}, retrying in {}ms (attempt {}/{})",
                            method,
                            url,
                            e,
                            delay.as_millis(),
                            attempt,
                            max_attempts
                        );
                        sleep(delay).await;
                        continue;
                    }

                    return Err(TransportError::Request {
                        method: method.to_string(),
                        url: url.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
