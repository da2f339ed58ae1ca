//! Async HTTP client wrapping reqwest.
//!
//! One shared client for the manifest, archive objects and images. Every
//! request carries the configured user agent; timeouts are set per request
//! because archive downloads must not share the image deadline.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::config::IngestConfig;
use crate::types::{IngestError, IngestResult};

/// Log a download progress line every this many bytes.
const PROGRESS_STEP: u64 = 100 * 1024 * 1024;

/// Response from an HTTP GET request with the body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if present.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the ingestion pipeline.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpClient {
    /// Create a client with the configured user agent and connect timeout.
    ///
    /// `read_timeout` bounds each wait on a streamed download, not the whole
    /// transfer.
    pub fn new(config: &IngestConfig) -> IngestResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            read_timeout: config.read_timeout(),
        })
    }

    /// GET `url` and read the whole body within `timeout`.
    pub async fn get(&self, url: &str, timeout: Duration) -> IngestResult<HttpResponse> {
        let r = self.client.get(url).timeout(timeout).send().await?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let content_type = r
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = r.bytes().await?.to_vec();

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }

    /// Stream `url` into `dest` without buffering the body in memory.
    ///
    /// Returns the number of bytes written. Non-success statuses are errors,
    /// and so is a transfer that goes quiet for longer than the read timeout.
    pub async fn download_to(&self, url: &str, dest: &Path) -> IngestResult<u64> {
        let mut r = self
            .stalled(url, self.client.get(url).send())
            .await??
            .error_for_status()?;
        let total = r.content_length();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut next_report = PROGRESS_STEP;

        while let Some(chunk) = self.stalled(url, r.chunk()).await?? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if written >= next_report {
                next_report += PROGRESS_STEP;
                match total {
                    Some(total) if total > 0 => tracing::info!(
                        url = %url,
                        "Downloaded {:.1}% ({:.1} MB)",
                        written as f64 / total as f64 * 100.0,
                        written as f64 / (1024.0 * 1024.0)
                    ),
                    _ => tracing::info!(
                        url = %url,
                        "Downloaded {:.1} MB",
                        written as f64 / (1024.0 * 1024.0)
                    ),
                }
            }
        }

        file.flush().await?;
        Ok(written)
    }

    async fn stalled<T>(
        &self,
        url: &str,
        fut: impl std::future::Future<Output = T>,
    ) -> IngestResult<T> {
        tokio::time::timeout(self.read_timeout, fut)
            .await
            .map_err(|_| IngestError::ArchiveRetrievalFailed {
                url: url.to_string(),
                reason: format!("no data received for {:?}", self.read_timeout),
            })
    }
}
