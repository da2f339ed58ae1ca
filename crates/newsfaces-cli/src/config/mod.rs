//! Configuration loading and resolution.

use std::path::PathBuf;

use clap::Args;

use newsfaces::config::{DEFAULT_MANIFEST_URL, DEFAULT_OUTPUT_DIR};
use newsfaces::IngestConfig;

/// Ingestion options shared by `run` and `process`.
#[derive(Args, Debug, Clone, Default)]
pub struct IngestArgs {
    /// Output directory for html/, images/ and mappings.json.
    /// Also reads from NEWSFACES_OUTPUT.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Manifest URL or local path listing archive objects.
    /// Also reads from NEWSFACES_MANIFEST.
    #[arg(long)]
    pub manifest: Option<String>,

    /// Base URL joined onto relative manifest entries.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Leading image candidates fetched per page.
    #[arg(long)]
    pub image_cap: Option<usize>,

    /// Timeout for each image request, in seconds.
    #[arg(long)]
    pub image_timeout_secs: Option<u64>,

    /// Stop each archive after this many HTML pages.
    #[arg(long, conflicts_with = "no_html_limit")]
    pub html_limit: Option<usize>,

    /// Stream every record of each archive.
    #[arg(long)]
    pub no_html_limit: bool,

    /// Concurrent image requests per page.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Delete downloaded archive files once processed.
    #[arg(long)]
    pub delete_archives: bool,
}

impl IngestArgs {
    /// Build the run configuration: flags, then environment, then defaults.
    pub fn into_config(self) -> IngestConfig {
        let mut config = IngestConfig::with_output_dir(resolve_output_dir(self.output.as_deref()));
        config.manifest = resolve_manifest(self.manifest.as_deref());

        if let Some(base_url) = self.base_url {
            config.archive_base_url = base_url;
        }
        if let Some(cap) = self.image_cap {
            config.image_cap = cap;
        }
        if let Some(secs) = self.image_timeout_secs {
            config.image_timeout_secs = secs;
        }
        if self.no_html_limit {
            config.html_page_limit = None;
        } else if let Some(limit) = self.html_limit {
            config.html_page_limit = Some(limit);
        }
        if let Some(concurrency) = self.concurrency {
            config.fetch_concurrency = concurrency.max(1);
        }
        config.keep_archives = !self.delete_archives;

        config
    }
}

/// Resolve the output directory.
pub fn resolve_output_dir(explicit: Option<&str>) -> PathBuf {
    PathBuf::from(pick(
        explicit,
        std::env::var("NEWSFACES_OUTPUT").ok(),
        DEFAULT_OUTPUT_DIR,
    ))
}

/// Resolve the manifest location.
pub fn resolve_manifest(explicit: Option<&str>) -> String {
    pick(
        explicit,
        std::env::var("NEWSFACES_MANIFEST").ok(),
        DEFAULT_MANIFEST_URL,
    )
}

fn pick(explicit: Option<&str>, env: Option<String>, default: &str) -> String {
    if let Some(value) = explicit {
        return value.to_string();
    }

    match env {
        Some(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}
