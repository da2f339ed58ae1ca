//! Page-to-asset mapping ledger, persisted as one JSON document.
//!
//! The whole ledger is rewritten after every append so that an interrupted
//! run never loses a page that was already processed.

use std::path::{Path, PathBuf};

use crate::store::write_atomic;
use crate::types::{ExtractedPage, IngestResult, LedgerStatistics};

/// Append-only ledger of processed pages.
#[derive(Debug)]
pub struct MappingLedger {
    path: PathBuf,
    pages: Vec<ExtractedPage>,
}

impl MappingLedger {
    /// Start an empty ledger that will be written to `path`.
    ///
    /// Nothing touches the disk until the first append or flush.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pages: Vec::new(),
        }
    }

    /// Read a previously persisted ledger.
    pub fn load(path: &Path) -> IngestResult<Self> {
        let bytes = std::fs::read(path)?;
        let pages: Vec<ExtractedPage> = serde_json::from_slice(&bytes)?;
        Ok(Self {
            path: path.to_path_buf(),
            pages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages(&self) -> &[ExtractedPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Add one page and persist the full ledger.
    ///
    /// If persisting fails the page is dropped again, so the in-memory list
    /// only holds pages that reached disk.
    pub fn append(&mut self, page: ExtractedPage) -> IngestResult<()> {
        self.pages.push(page);
        if let Err(e) = self.flush() {
            self.pages.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Rewrite the ledger document.
    pub fn flush(&self) -> IngestResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&self.pages)?;
        write_atomic(&self.path, &payload)?;
        tracing::debug!(pages = self.pages.len(), "Saved mappings to {}", self.path.display());
        Ok(())
    }

    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            pages_processed: self.pages.len(),
            images_discovered: self.pages.iter().map(|p| p.image_urls.len()).sum(),
            images_downloaded: self.pages.iter().map(|p| p.downloaded_images.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DownloadedImage;
    use chrono::Utc;

    fn make_page(hash: &str, candidates: usize, downloaded: usize) -> ExtractedPage {
        ExtractedPage {
            html_hash: hash.to_string(),
            record_id: Some(format!("<urn:uuid:{hash}>")),
            target_uri: Some(format!("https://news.example/{hash}")),
            date: Some("2025-06-20T10:00:00Z".to_string()),
            html_file: format!("{hash}.html"),
            html_path: PathBuf::from(format!("/out/html/{hash}.html")),
            image_urls: (0..candidates)
                .map(|i| format!("https://news.example/{i}.jpg"))
                .collect(),
            downloaded_images: (0..downloaded)
                .map(|i| DownloadedImage {
                    filename: format!("{hash}_{i}_x.jpg"),
                    filepath: PathBuf::from(format!("/out/images/{hash}_{i}_x.jpg")),
                    url: format!("https://news.example/{i}.jpg"),
                    size: 10,
                    detected_format: None,
                })
                .collect(),
            extraction_time: Utc::now(),
        }
    }

    #[test]
    fn test_new_ledger_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let ledger = MappingLedger::new(&path);
        assert!(ledger.is_empty());
        assert!(!path.exists());
        assert_eq!(ledger.statistics(), LedgerStatistics::default());
    }

    #[test]
    fn test_append_persists_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let mut ledger = MappingLedger::new(&path);

        ledger.append(make_page("a", 3, 1)).unwrap();
        assert_eq!(MappingLedger::load(&path).unwrap().len(), 1);

        ledger.append(make_page("b", 7, 5)).unwrap();
        let loaded = MappingLedger::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.pages()[0].html_hash, "a");
        assert_eq!(loaded.pages()[1].html_hash, "b");
        assert_eq!(loaded.pages(), ledger.pages());
    }

    #[test]
    fn test_failed_append_is_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut ledger = MappingLedger::new(blocker.join("mappings.json"));
        assert!(ledger.append(make_page("a", 1, 0)).is_err());
        assert!(ledger.is_empty());
        assert_eq!(ledger.statistics(), LedgerStatistics::default());
    }

    #[test]
    fn test_statistics() {
        let mut ledger = MappingLedger::new(tempfile::tempdir().unwrap().path().join("m.json"));
        ledger.pages.push(make_page("a", 3, 1));
        ledger.pages.push(make_page("b", 5, 4));

        let stats = ledger.statistics();
        assert_eq!(stats.pages_processed, 2);
        assert_eq!(stats.images_discovered, 8);
        assert_eq!(stats.images_downloaded, 5);
    }

    #[test]
    fn test_document_is_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let mut ledger = MappingLedger::new(&path);
        ledger.append(make_page("a", 1, 1)).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let entry = &value.as_array().unwrap()[0];
        assert_eq!(entry["html_file"], "a.html");
        assert_eq!(entry["target_uri"], "https://news.example/a");
        assert_eq!(entry["downloaded_images"][0]["size"], 10);
        assert!(entry["extraction_time"].is_string());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(MappingLedger::load(&path).is_err());
        assert!(MappingLedger::load(&dir.path().join("absent.json")).is_err());
    }
}
