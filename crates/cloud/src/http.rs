//! HTTP client wrapper with Range request support and retry logic.

use std::time::Duration;

use futures::stream::{FuturesOrdered, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::{CloudError, Result};

/// HTTP client for fetching byte ranges from remote files.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

/// Response from a HEAD request.
pub struct HeadInfo {
    /// Total file size in bytes, if reported by the server.
    pub content_length: Option<u64>,
}

/// Backoff before retry `attempt` (1-based): 500 ms, 1 s, 2 s, ...
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * (1u64 << attempt.saturating_sub(1).min(6)))
}

/// Whether a status is worth retrying.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl HttpClient {
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Underlying reqwest client, for JSON requests that share the pool.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a HEAD request to discover the file size.
    pub async fn head(&self, url: &str) -> Result<HeadInfo> {
        let resp = self.send_with_retry(self.client.head(url)).await?;
        if !resp.status().is_success() {
            return Err(CloudError::Network(format!(
                "HTTP {} on HEAD {url}",
                resp.status()
            )));
        }

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        Ok(HeadInfo {
            content_length: header("content-length").and_then(|v| v.parse().ok()),
        })
    }

    /// Fetch `[offset .. offset + length)` from a remote file.
    pub async fn fetch_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let resp = self
            .send_with_retry(self.client.get(url).header("Range", range))
            .await?;

        let status = resp.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE || status == StatusCode::OK {
            return Err(CloudError::RangeNotSupported {
                url: url.to_string(),
            });
        }
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(CloudError::Network(format!("HTTP {status} fetching {url}")));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Fetch several `(offset, length)` ranges concurrently, results in order.
    pub async fn fetch_ranges(&self, url: &str, ranges: &[(u64, u64)]) -> Result<Vec<Vec<u8>>> {
        let mut futs: FuturesOrdered<_> = ranges
            .iter()
            .map(|&(offset, length)| self.fetch_range(url, offset, length))
            .collect();

        let mut results = Vec::with_capacity(ranges.len());
        while let Some(res) = futs.next().await {
            results.push(res?);
        }
        Ok(results)
    }

    /// Send a request, retrying connect/timeout failures and 5xx/429 responses
    /// with exponential backoff. Other 4xx responses are returned as-is.
    pub async fn send_with_retry(&self, request: RequestBuilder) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let Some(req) = request.try_clone() else {
                return Ok(request.send().await?);
            };

            let outcome = req.send().await;
            let retryable = match &outcome {
                Ok(resp) => is_transient(resp.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !retryable || attempt >= self.max_retries {
                return Ok(outcome?);
            }

            attempt += 1;
            let delay = backoff(attempt);
            tracing::debug!(attempt, ?delay, "retrying HTTP request");
            tokio::time::sleep(delay).await;
        }
    }
}
