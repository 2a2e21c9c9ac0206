#![allow(dead_code)]

use davmirror::services::webdav::{RetryConfig, WebDAVConfig, WebDAVMirrorService};
use davmirror::{ExecutionEnvironment, RunContext};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 207 body listing `hrefs` in order
pub fn multistatus(hrefs: &[&str]) -> String {
    let responses: String = hrefs
        .iter()
        .map(|href| {
            format!(
                "  <d:response><d:href>{}</d:href><d:propstat><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>\n",
                href
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<d:multistatus xmlns:d=\"DAV:\">\n{}</d:multistatus>",
        responses
    )
}

pub async fn mount_listing(server: &MockServer, dir: &str, hrefs: &[&str]) {
    Mock::given(method("PROPFIND"))
        .and(path(dir))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(hrefs)))
        .mount(server)
        .await;
}

pub async fn mount_file(server: &MockServer, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay_ms: 1,
        max_delay_ms: 10,
        ..RetryConfig::default()
    }
}

pub fn mirror_service(server_url: &str, job_id: &str, workers: usize, ledger_dir: &Path) -> WebDAVMirrorService {
    let config = WebDAVConfig::new(server_url.to_string(), "testuser".to_string(), "testpass".to_string());
    let context = RunContext::new(job_id, "test-node", workers, ExecutionEnvironment::Local);
    WebDAVMirrorService::new_with_retry(config, fast_retry(), context, ledger_dir)
        .expect("Failed to create mirror service")
}

/// Every file below `root`, relative to it, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// A canned raw HTTP response; the head is sent verbatim, so it may promise
/// more body than it delivers
#[derive(Clone)]
pub struct RawResponse {
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn multistatus(hrefs: &[&str]) -> Self {
        let body = multistatus(hrefs).into_bytes();
        Self {
            head: format!(
                "HTTP/1.1 207 Multi-Status\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            ),
            body,
        }
    }

    pub fn ok(body: &[u8]) -> Self {
        Self {
            head: format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            ),
            body: body.to_vec(),
        }
    }

    /// No `Content-Length`; the body ends when the connection closes
    pub fn without_length(body: &[u8]) -> Self {
        Self {
            head: "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string(),
            body: body.to_vec(),
        }
    }

    /// Announces `announced` bytes but only sends `body`
    pub fn truncated(announced: u64, body: &[u8]) -> Self {
        Self {
            head: format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                announced
            ),
            body: body.to_vec(),
        }
    }
}

/// Minimal HTTP/1.1 server over a raw `TcpListener`, one request per connection
pub struct RawServer {
    pub uri: String,
    pub max_in_flight: Arc<AtomicUsize>,
    pub requests: Arc<AtomicUsize>,
}

impl RawServer {
    /// Serve `routes` keyed by `(method, path)`; unknown routes get a 404.
    /// Every response is held back for `delay`.
    pub async fn start(routes: HashMap<(String, String), RawResponse>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));

        {
            let max_in_flight = max_in_flight.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else { return };
                    let routes = routes.clone();
                    let in_flight = in_flight.clone();
                    let max_in_flight = max_in_flight.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(current, Ordering::SeqCst);
                        requests.fetch_add(1, Ordering::SeqCst);
                        serve_one(stream, &routes, delay, &in_flight).await;
                    });
                }
            });
        }

        Self {
            uri: format!("http://{}", addr),
            max_in_flight,
            requests,
        }
    }
}

async fn serve_one(
    mut stream: TcpStream,
    routes: &HashMap<(String, String), RawResponse>,
    delay: Duration,
    in_flight: &AtomicUsize,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let content_length: usize = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0);

    // Drain the request body so closing the socket does not reset the connection
    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    tokio::time::sleep(delay).await;
    // The client can only start its next request after reading this response
    in_flight.fetch_sub(1, Ordering::SeqCst);

    let response = routes.get(&(method, target)).cloned().unwrap_or_else(|| RawResponse {
        head: "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        body: Vec::new(),
    });
    let _ = stream.write_all(response.head.as_bytes()).await;
    let _ = stream.write_all(&response.body).await;
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}

pub fn route(method: &str, path: &str) -> (String, String) {
    (method.to_string(), path.to_string())
}
