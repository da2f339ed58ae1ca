//! Content-addressed flat-file store for HTML bodies and images.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::types::IngestResult;

const HTML_DIR: &str = "html";
const IMAGES_DIR: &str = "images";
const HTML_EXTENSION: &str = ".html";

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Where a page body was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHtml {
    pub hash: String,
    pub filename: String,
    pub path: PathBuf,
}

/// On-disk layout: `<root>/html/<hash>.html` and `<root>/images/<filename>`.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    html_dir: PathBuf,
    images_dir: PathBuf,
}

impl ContentStore {
    /// Open the store, creating both subdirectories.
    pub fn open(root: &Path) -> IngestResult<Self> {
        let html_dir = root.join(HTML_DIR);
        let images_dir = root.join(IMAGES_DIR);
        std::fs::create_dir_all(&html_dir)?;
        std::fs::create_dir_all(&images_dir)?;

        Ok(Self {
            root: root.to_path_buf(),
            html_dir,
            images_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn html_dir(&self) -> &Path {
        &self.html_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Write a page body under its content hash.
    pub fn store_html(&self, bytes: &[u8]) -> IngestResult<StoredHtml> {
        let hash = content_hash(bytes);
        let filename = format!("{hash}{HTML_EXTENSION}");
        let path = self.html_dir.join(&filename);
        write_atomic(&path, bytes)?;

        Ok(StoredHtml {
            hash,
            filename,
            path,
        })
    }

    /// Write image bytes under a caller-derived filename.
    pub fn store_image(&self, bytes: &[u8], filename: &str) -> IngestResult<PathBuf> {
        let path = self.images_dir.join(filename);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> IngestResult<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash(b"abc").len(), 64);
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(&dir.path().join("out")).unwrap();
        assert!(store.html_dir().is_dir());
        assert!(store.images_dir().is_dir());
        assert_eq!(store.root(), dir.path().join("out"));
    }

    #[test]
    fn test_same_html_same_filename() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let first = store.store_html(b"<html>same</html>").unwrap();
        let second = store.store_html(b"<html>same</html>").unwrap();
        let other = store.store_html(b"<html>other</html>").unwrap();

        assert_eq!(first, second);
        assert_ne!(first.filename, other.filename);
        assert_eq!(first.filename, format!("{}.html", first.hash));
        assert_eq!(std::fs::read_dir(store.html_dir()).unwrap().count(), 2);
        assert_eq!(std::fs::read(&first.path).unwrap(), b"<html>same</html>");
    }

    #[test]
    fn test_same_html_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let first = ContentStore::open(dir.path()).unwrap().store_html(b"page").unwrap();
        let second = ContentStore::open(dir.path()).unwrap().store_html(b"page").unwrap();
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_store_image_overwrites_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let path = store.store_image(b"\x89PNG", "p_0_h.png").unwrap();
        let again = store.store_image(b"\x89PNG", "p_0_h.png").unwrap();
        assert_eq!(path, again);
        assert_eq!(path, store.images_dir().join("p_0_h.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
        assert!(!store.images_dir().join("p_0_h.png.tmp").exists());
    }
}
