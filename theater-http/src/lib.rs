//! Streaming image downloader with safe logging and retries.
//!
//! - Streams the response body to a `.part` file and renames it into place,
//!   so a failed transfer never leaves a truncated image behind
//! - Retries network errors, 429 and 5xx with exponential backoff and
//!   `Retry-After` support
//! - Logs host and path only; signed CDN query parameters are redacted
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), theater_http::HttpError> {
//! let client = theater_http::HttpClient::new("Mozilla/5.0")?;
//! let bytes = client
//!     .download_to_file("https://cdn.example.com/p.jpg", std::path::Path::new("p.jpg"))
//!     .await?;
//! # Ok(()) }
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use theater_common::fetch::ImageFetcher;
use theater_config::DownloadConfig;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("write failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client that sends `user_agent` on every request.
    ///
    /// ```no_run
    /// use theater_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("Mozilla/5.0")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(60));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(60),
            max_retries: 2,
        })
    }

    pub fn from_config(config: &DownloadConfig) -> Result<Self, HttpError> {
        Ok(Self::new(&config.user_agent)?
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retries(config.retries))
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Stream `url` into `destination`, returning the number of bytes written.
    pub async fn download_to_file(&self, url: &str, destination: &Path) -> Result<u64, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        let (host_path, query) = redact_query(&url);
        let partial = partial_path(destination);

        let mut attempt = 0usize;
        loop {
            let attempt0 = attempt + 1;
            tracing::debug!(
                attempt = attempt0,
                max_retries = self.max_retries,
                %host_path,
                ?query,
                timeout_ms = self.default_timeout.as_millis() as u64,
                "http.download.start"
            );

            let t0 = Instant::now();
            let resp = match self
                .inner
                .get(url.clone())
                .timeout(self.default_timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < self.max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            %message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(%host_path, %message, "http.network_error.send");
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-fb-trace-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            if !status.is_success() {
                let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
                if (is_429 || status.is_server_error()) && attempt < self.max_retries {
                    attempt += 1;
                    let delay = match retry_after_delay(&headers, self.default_timeout) {
                        Some(delay) => delay,
                        None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                        None => backoff(attempt),
                    };
                    tracing::warn!(
                        %status,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        "http.retrying"
                    );
                    sleep(delay).await;
                    continue;
                }

                let body = resp.bytes().await.unwrap_or_default();
                let message = snip_body(&body);
                tracing::warn!(%status, %host_path, x_request_id = %request_id, "http.error");
                return Err(HttpError::Api {
                    status,
                    message,
                    request_id,
                });
            }

            match stream_to_file(resp, &partial).await {
                Ok(written) => {
                    tokio::fs::rename(&partial, destination)
                        .await
                        .map_err(|source| HttpError::Io {
                            path: destination.to_path_buf(),
                            source,
                        })?;
                    tracing::debug!(
                        %host_path,
                        bytes = written,
                        duration_ms = t0.elapsed().as_millis() as u64,
                        "http.download.done"
                    );
                    return Ok(written);
                }
                Err(err) => {
                    let _ = tokio::fs::remove_file(&partial).await;
                    let retryable = matches!(err, HttpError::Network(_));
                    if retryable && attempt < self.max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            error = %err,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpClient {
    async fn fetch(&self, url: &str, destination: &Path) -> anyhow::Result<u64> {
        Ok(self.download_to_file(url, destination).await?)
    }
}

// ==============================
// Helpers
// ==============================

async fn stream_to_file(resp: reqwest::Response, path: &Path) -> Result<u64, HttpError> {
    let io_err = |source| HttpError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| HttpError::Network(e.to_string()))?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(16)))
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

/// Server-requested wait, never longer than `cap`.
fn retry_after_delay(h: &HeaderMap, cap: Duration) -> Option<Duration> {
    retry_after_delay_secs(h).map(|secs| Duration::from_secs(secs).min(cap))
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

/// "host + path" for logging, plus query pairs with signed values redacted.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "auth"
                    | "key"
                    | "token"
                    | "signature"
                    | "oh"
                    | "oe"
                    | "_nc_ohc"
                    | "_nc_sid"
            );
            let v = if is_secret {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            (k, v)
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn signed_cdn_params_are_redacted() {
        let url = Url::parse(
            "https://scontent.xx.fbcdn.net/v/t39/123_n.jpg?stp=dst-jpg&_nc_sid=abc&oh=00_sig&oe=65F0",
        )
        .unwrap();
        let (host_path, q) = redact_query(&url);
        assert_eq!(host_path, "scontent.xx.fbcdn.net/v/t39/123_n.jpg");
        assert!(q.contains(&("stp".into(), "dst-jpg".into())));
        assert!(q.contains(&("oh".into(), "<redacted>".into())));
        assert!(q.contains(&("_nc_sid".into(), "<redacted>".into())));
    }

    #[test]
    fn retry_after_is_parsed() {
        let mut h = HeaderMap::new();
        assert_eq!(retry_after_delay_secs(&h), None);
        h.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_delay_secs(&h), Some(3));
    }

    #[test]
    fn retry_after_is_capped() {
        let mut h = HeaderMap::new();
        h.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(
            retry_after_delay(&h, Duration::from_secs(60)),
            Some(Duration::from_secs(60))
        );
        h.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(
            retry_after_delay(&h, Duration::from_secs(60)),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/s/image_001.jpg")),
            PathBuf::from("/tmp/s/image_001.jpg.part")
        );
    }

    #[test]
    fn snip_respects_char_boundaries() {
        let body = "é".repeat(400);
        let s = snip_body(body.as_bytes());
        assert!(s.ends_with("..."));
    }
}
