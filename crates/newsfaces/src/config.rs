//! Run configuration passed explicitly to every pipeline component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Common Crawl manifest used when none is given.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://data.commoncrawl.org/crawl-data/CC-MAIN-2025-26/warc.paths.gz";

/// Prefix joined onto relative manifest entries.
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://data.commoncrawl.org/";

/// Client identification sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Output root used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "extracted_data";

/// Ledger document name under the output root.
pub const LEDGER_FILE_NAME: &str = "mappings.json";

/// Configuration for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub output_dir: PathBuf,
    /// HTTP(S) URL or local path of the archive manifest.
    pub manifest: String,
    pub archive_base_url: String,
    /// Leading image candidates attempted per page.
    pub image_cap: usize,
    pub image_timeout_secs: u64,
    pub manifest_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Longest wait for the next bytes of an archive download.
    pub read_timeout_secs: u64,
    pub user_agent: String,
    /// Stop each archive after this many HTML records. `None` streams everything.
    pub html_page_limit: Option<usize>,
    /// Concurrent image retrievals per page; 1 fetches sequentially.
    pub fetch_concurrency: usize,
    /// Keep retrieved archive files on disk after processing.
    pub keep_archives: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            manifest: DEFAULT_MANIFEST_URL.to_string(),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            image_cap: 5,
            image_timeout_secs: 10,
            manifest_timeout_secs: 60,
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            html_page_limit: Some(10),
            fetch_concurrency: 1,
            keep_archives: true,
        }
    }
}

impl IngestConfig {
    /// Default configuration rooted at `output_dir`.
    pub fn with_output_dir(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(LEDGER_FILE_NAME)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
