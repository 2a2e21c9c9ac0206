use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::ListingError;
use crate::models::RemoteEntry;
use crate::webdav_xml_parser::parse_multistatus_hrefs;
use super::connection::WebDAVConnection;

/// Lists remote collections with `PROPFIND Depth: 1`
pub struct WebDAVDiscovery {
    connection: Arc<WebDAVConnection>,
}

impl WebDAVDiscovery {
    pub fn new(connection: Arc<WebDAVConnection>) -> Self {
        Self { connection }
    }

    /// Lists a remote directory.
    ///
    /// Entries come back in server order and include the directory itself as
    /// the first element.
    pub async fn list_directory(&self, remote_path: &str) -> Result<Vec<RemoteEntry>, ListingError> {
        let response = self
            .connection
            .propfind(remote_path)
            .await
            .map_err(|source| ListingError::Transport {
                path: remote_path.to_string(),
                source,
            })
            .inspect_err(|e| error!("Failed to list directory {}: {}", remote_path, e))?;

        let status = response.status().as_u16();
        if status != 207 {
            error!("Failed to list directory {}: expected 207, got {}", remote_path, status);
            return Err(ListingError::UnexpectedStatus {
                path: remote_path.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| ListingError::Body {
            path: remote_path.to_string(),
            source,
        })?;

        let hrefs = parse_multistatus_hrefs(&body).map_err(|e| ListingError::MalformedResponse {
            path: remote_path.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Listed {} entries in {}", hrefs.len(), remote_path);
        Ok(hrefs.into_iter().map(RemoteEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::webdav::config::{RetryConfig, WebDAVConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn discovery(server_url: &str) -> WebDAVDiscovery {
        let config = WebDAVConfig::new(server_url.to_string(), "testuser".to_string(), "testpass".to_string());
        let retry = RetryConfig {
            max_retries: 1,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..RetryConfig::default()
        };
        let connection = WebDAVConnection::new(config, retry, 2).expect("Failed to create connection");
        WebDAVDiscovery::new(Arc::new(connection))
    }

    #[tokio::test]
    async fn test_list_directory_returns_hrefs_in_order() {
        let mock_server = MockServer::start().await;
        let body = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
    <d:response><d:href>/data/</d:href></d:response>
    <d:response><d:href>/data/z.txt</d:href></d:response>
    <d:response><d:href>/data/a.txt</d:href></d:response>
</d:multistatus>"#;

        Mock::given(method("PROPFIND"))
            .and(path("/data/"))
            .respond_with(ResponseTemplate::new(207).set_body_string(body))
            .mount(&mock_server)
            .await;

        let entries = discovery(&mock_server.uri()).list_directory("/data/").await.unwrap();
        let hrefs: Vec<&str> = entries.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/data/", "/data/z.txt", "/data/a.txt"]);
        assert!(entries[0].is_collection());
    }

    #[tokio::test]
    async fn test_non_multistatus_success_is_a_listing_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PROPFIND"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
            .mount(&mock_server)
            .await;

        let err = discovery(&mock_server.uri()).list_directory("/data/").await.unwrap_err();
        assert!(matches!(err, ListingError::UnexpectedStatus { status: 200, .. }));
        assert_eq!(err.path(), "/data/");
    }

    #[tokio::test]
    async fn test_http_error_includes_path_and_cause() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PROPFIND"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let err = discovery(&mock_server.uri()).list_directory("/data/private/").await.unwrap_err();
        match err {
            ListingError::Transport { ref path, ref source } => {
                assert_eq!(path, "/data/private/");
                assert_eq!(source.status(), Some(403));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_listing_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PROPFIND"))
            .respond_with(ResponseTemplate::new(207).set_body_string("<d:multistatus xmlns:d=\"DAV:\"><d:href>x</d:nope>"))
            .mount(&mock_server)
            .await;

        let err = discovery(&mock_server.uri()).list_directory("/data/").await.unwrap_err();
        assert!(matches!(err, ListingError::MalformedResponse { .. }));
    }
}
