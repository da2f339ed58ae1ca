//! Bounded image retrieval with content verification.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::config::IngestConfig;
use crate::http::HttpClient;
use crate::store::{content_hash, ContentStore};
use crate::types::{DownloadedImage, IngestError, IngestResult};

/// Content-type fragments and the extension each maps to, checked in order.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("image/bmp", ".bmp"),
];

/// URL path suffixes accepted as an extension when the content type is silent.
const PATH_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".bmp"];

const DEFAULT_EXTENSION: &str = ".jpg";

/// A response that passed verification, not yet written.
#[derive(Debug)]
struct VerifiedImage {
    content_type: String,
    body: Vec<u8>,
}

/// Retrieves the leading image candidates of a page.
#[derive(Clone)]
pub struct ImageFetcher {
    http: HttpClient,
    cap: usize,
    timeout: Duration,
    concurrency: usize,
}

impl ImageFetcher {
    pub fn new(http: HttpClient, config: &IngestConfig) -> Self {
        Self {
            http,
            cap: config.image_cap,
            timeout: config.image_timeout(),
            concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Fetch up to the cap of leading `candidates` and store every verified
    /// image. Failures skip that one candidate; results keep candidate order.
    pub async fn fetch(
        &self,
        candidates: &[String],
        page_hash: &str,
        store: &ContentStore,
    ) -> Vec<DownloadedImage> {
        let results: Vec<(usize, &String, IngestResult<VerifiedImage>)> =
            stream::iter(candidates.iter().take(self.cap).enumerate())
                .map(|(index, url)| async move { (index, url, self.retrieve(url).await) })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut downloaded = Vec::new();
        for (index, url, result) in results {
            let image = match result {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(url = %url, page_hash = %page_hash, "Skipping image: {e}");
                    continue;
                }
            };

            let image_hash = content_hash(&image.body);
            let extension = image_extension(&image.content_type, url);
            let filename = image_filename(page_hash, index, &image_hash, extension);

            match store.store_image(&image.body, &filename) {
                Ok(filepath) => {
                    tracing::debug!("Downloaded image: {filename}");
                    downloaded.push(DownloadedImage {
                        filename,
                        filepath,
                        url: url.clone(),
                        size: image.body.len() as u64,
                        detected_format: sniff_format(&image.body),
                    });
                }
                Err(e) => {
                    tracing::warn!(url = %url, "Failed to store image {filename}: {e}");
                }
            }
        }

        downloaded
    }

    async fn retrieve(&self, url: &str) -> IngestResult<VerifiedImage> {
        let resp = self
            .http
            .get(url, self.timeout)
            .await
            .map_err(|e| IngestError::ImageFetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.is_success() {
            return Err(IngestError::ImageFetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", resp.status),
            });
        }

        if resp.body.is_empty() {
            return Err(IngestError::ImageContentInvalid {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }

        let content_type = resp.content_type.unwrap_or_default();
        if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(IngestError::ImageContentInvalid {
                url: url.to_string(),
                reason: format!("content type {content_type:?} is not an image"),
            });
        }

        Ok(VerifiedImage {
            content_type,
            body: resp.body,
        })
    }
}

/// File extension (with leading dot) for an image, from its content type,
/// then its URL path, then `.jpg`.
pub fn image_extension(content_type: &str, url: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    if let Some(ext) = MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| content_type.contains(mime))
        .map(|(_, ext)| *ext)
    {
        return ext;
    }

    if let Ok(parsed) = Url::parse(url) {
        let path = parsed.path().to_ascii_lowercase();
        if let Some(ext) = PATH_EXTENSIONS.iter().find(|ext| path.ends_with(**ext)) {
            return *ext;
        }
    }

    DEFAULT_EXTENSION
}

/// `{page_hash}_{index}_{image_hash}{ext}`.
pub fn image_filename(page_hash: &str, index: usize, image_hash: &str, extension: &str) -> String {
    format!("{page_hash}_{index}_{image_hash}{extension}")
}

fn sniff_format(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().map(|ext| ext.to_string()))
}
