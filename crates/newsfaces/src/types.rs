//! Core data types for archive ingestion and page/asset mappings.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One archive object to retrieve and stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    pub url: String,
    pub local_path: PathBuf,
}

/// WARC header block of a single record.
///
/// Names keep their original spelling; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeaders {
    entries: Vec<(String, String)>,
}

impl RecordHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append folded continuation text to the most recent header.
    pub(crate) fn extend_last(&mut self, continuation: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                value.push(' ');
                value.push_str(continuation);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A single record read from an archive. Lives for one iteration step.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Value of `WARC-Type`, lowercased.
    pub record_type: String,
    pub headers: RecordHeaders,
    /// Record content, exactly `Content-Length` bytes.
    pub block: Vec<u8>,
    pub target_uri: Option<String>,
    pub date: Option<String>,
    pub record_id: Option<String>,
}

impl RawRecord {
    pub fn from_parts(headers: RecordHeaders, block: Vec<u8>) -> Self {
        let record_type = headers
            .get("WARC-Type")
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let target_uri = headers.get("WARC-Target-URI").map(|s| s.trim().to_string());
        let date = headers.get("WARC-Date").map(|s| s.trim().to_string());
        let record_id = headers.get("WARC-Record-ID").map(|s| s.trim().to_string());

        Self {
            record_type,
            headers,
            block,
            target_uri,
            date,
            record_id,
        }
    }
}

/// A stored image belonging to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedImage {
    pub filename: String,
    pub filepath: PathBuf,
    pub url: String,
    pub size: u64,
    /// Container format sniffed from the leading bytes, when recognisable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_format: Option<String>,
}

/// One processed HTML record and the assets extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// SHA-256 of the HTML body; the page identity.
    pub html_hash: String,
    pub record_id: Option<String>,
    pub target_uri: Option<String>,
    pub date: Option<String>,
    pub html_file: String,
    pub html_path: PathBuf,
    /// Every resolved candidate, deduplicated, in first-seen order.
    pub image_urls: Vec<String>,
    pub downloaded_images: Vec<DownloadedImage>,
    pub extraction_time: DateTime<Utc>,
}

/// Aggregate counts over a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub pages_processed: usize,
    pub images_discovered: usize,
    pub images_downloaded: usize,
}

/// Outcome of streaming one archive object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub records_seen: usize,
    pub html_pages: usize,
    pub pages_persisted: usize,
    /// Set when the stream ended on a malformed frame.
    pub truncated: Option<String>,
}

impl ArchiveReport {
    /// Whether the object was read as an archive at all. A stream that
    /// failed on its very first frame was not.
    pub fn parsed(&self) -> bool {
        self.records_seen > 0 || self.truncated.is_none()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub archives_attempted: usize,
    pub archives_processed: usize,
    pub records_seen: usize,
    pub html_pages: usize,
    pub statistics: LedgerStatistics,
}

impl RunSummary {
    pub(crate) fn absorb(&mut self, report: &ArchiveReport) {
        if report.parsed() {
            self.archives_processed += 1;
        }
        self.records_seen += report.records_seen;
        self.html_pages += report.html_pages;
    }
}

/// Errors that can occur during ingestion.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("Archive retrieval failed for {url}: {reason}")]
    ArchiveRetrievalFailed { url: String, reason: String },

    #[error("Archive truncated after {records} records: {reason}")]
    ArchiveParseTruncated { records: usize, reason: String },

    #[error("HTML parse failed: {0}")]
    HtmlParseFailed(String),

    #[error("Image fetch failed for {url}: {reason}")]
    ImageFetchFailed { url: String, reason: String },

    #[error("Invalid image content from {url}: {reason}")]
    ImageContentInvalid { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result type.
pub type IngestResult<T> = Result<T, IngestError>;
