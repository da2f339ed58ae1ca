//! Manifest resolution and archive retrieval.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use url::Url;

use crate::archive::is_gzip;
use crate::config::IngestConfig;
use crate::http::HttpClient;
use crate::types::{ArchiveSource, IngestError, IngestResult};

/// Resolve up to `count` archive sources from the configured manifest, in
/// manifest order.
pub async fn resolve_sources(
    config: &IngestConfig,
    http: &HttpClient,
    count: usize,
) -> IngestResult<Vec<ArchiveSource>> {
    tracing::info!(manifest = %config.manifest, count, "Resolving archive manifest");

    let raw = read_manifest(config, http).await?;
    let text = decode_manifest(&raw)?;
    let urls = parse_manifest(&text, &config.archive_base_url, count)?;

    if urls.is_empty() {
        return Err(IngestError::ManifestUnavailable(format!(
            "manifest {} lists no archive objects",
            config.manifest
        )));
    }

    let sources: Vec<ArchiveSource> = urls
        .into_iter()
        .map(|url| {
            let local_path = config.output_dir.join(archive_file_name(&url));
            ArchiveSource { url, local_path }
        })
        .collect();

    for (i, source) in sources.iter().enumerate() {
        tracing::info!("Archive {}: {}", i + 1, source.url);
    }

    Ok(sources)
}

async fn read_manifest(config: &IngestConfig, http: &HttpClient) -> IngestResult<Vec<u8>> {
    if !is_remote(&config.manifest) {
        return tokio::fs::read(&config.manifest).await.map_err(|e| {
            IngestError::ManifestUnavailable(format!("cannot read {}: {e}", config.manifest))
        });
    }

    let resp = http
        .get(&config.manifest, config.manifest_timeout())
        .await
        .map_err(|e| IngestError::ManifestUnavailable(format!("{}: {e}", config.manifest)))?;

    if !resp.is_success() {
        return Err(IngestError::ManifestUnavailable(format!(
            "{} returned HTTP {}",
            config.manifest, resp.status
        )));
    }

    Ok(resp.body)
}

/// Decode a manifest body that may be gzip-compressed.
pub fn decode_manifest(raw: &[u8]) -> IngestResult<String> {
    let bytes = if is_gzip(raw) {
        let mut out = Vec::new();
        MultiGzDecoder::new(raw)
            .read_to_end(&mut out)
            .map_err(|e| IngestError::ManifestUnavailable(format!("corrupt gzip manifest: {e}")))?;
        out
    } else {
        raw.to_vec()
    };

    String::from_utf8(bytes)
        .map_err(|e| IngestError::ManifestUnavailable(format!("manifest is not UTF-8: {e}")))
}

/// Take up to `count` entries, resolving relative paths against `base_url`.
///
/// Blank lines and `#` comments are skipped.
pub fn parse_manifest(text: &str, base_url: &str, count: usize) -> IngestResult<Vec<String>> {
    let base = Url::parse(base_url).map_err(|e| {
        IngestError::ManifestUnavailable(format!("invalid archive base URL {base_url}: {e}"))
    })?;

    let urls = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            if is_remote(line) {
                return Some(line.to_string());
            }
            match base.join(line.trim_start_matches('/')) {
                Ok(u) => Some(u.to_string()),
                Err(e) => {
                    tracing::warn!(entry = %line, "Skipping unresolvable manifest entry: {e}");
                    None
                }
            }
        })
        .take(count)
        .collect();

    Ok(urls)
}

/// Retrieve an archive object to its local path.
///
/// Downloads land in `<local_path>.part` and are renamed on completion, so an
/// existing file at `local_path` is always complete and gets reused.
pub async fn retrieve_archive(http: &HttpClient, source: &ArchiveSource) -> IngestResult<PathBuf> {
    let retrieval_failed = |reason: String| IngestError::ArchiveRetrievalFailed {
        url: source.url.clone(),
        reason,
    };

    if !is_remote(&source.url) {
        let path = PathBuf::from(&source.url);
        if path.is_file() {
            return Ok(path);
        }
        return Err(retrieval_failed("local archive does not exist".to_string()));
    }

    if is_complete_file(&source.local_path).await {
        tracing::info!("Reusing archive already on disk: {}", source.local_path.display());
        return Ok(source.local_path.clone());
    }

    if let Some(parent) = source.local_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| retrieval_failed(format!("cannot create {}: {e}", parent.display())))?;
    }

    let partial = partial_path(&source.local_path);
    tracing::info!(url = %source.url, "Downloading archive object");

    match http.download_to(&source.url, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, &source.local_path)
                .await
                .map_err(|e| retrieval_failed(format!("cannot finalize download: {e}")))?;
            tracing::info!(bytes, "Download complete: {}", source.local_path.display());
            Ok(source.local_path.clone())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(retrieval_failed(e.to_string()))
        }
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

async fn is_complete_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Last path segment of an archive URL, used as its local file name.
pub fn archive_file_name(url: &str) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());

    if name.is_empty() {
        "archive.warc".to_string()
    } else {
        name
    }
}
