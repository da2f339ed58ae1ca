//! Pipeline driver: manifest → archives → HTML records → images → ledger.
//!
//! Failures are absorbed at the smallest scope that owns them. One image,
//! one page, or one archive object can fail without stopping the run; only
//! an unavailable manifest ends it with an error.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::archive::ArchiveReader;
use crate::classifier::{classify, Classification, HtmlRecord};
use crate::config::IngestConfig;
use crate::extractor::extract_image_urls;
use crate::fetcher::ImageFetcher;
use crate::http::HttpClient;
use crate::ledger::MappingLedger;
use crate::locator::{resolve_sources, retrieve_archive};
use crate::store::ContentStore;
use crate::types::{ArchiveReport, ArchiveSource, ExtractedPage, IngestResult, RunSummary};

/// Records between progress lines.
const PROGRESS_INTERVAL: usize = 1000;

/// Owns the run context, the store, and the ledger for one run.
pub struct Pipeline {
    config: IngestConfig,
    http: HttpClient,
    store: ContentStore,
    fetcher: ImageFetcher,
    ledger: MappingLedger,
}

impl Pipeline {
    /// Prepare the output layout and an empty ledger.
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        let http = HttpClient::new(&config)?;
        let store = ContentStore::open(&config.output_dir)?;
        let fetcher = ImageFetcher::new(http.clone(), &config);
        let ledger = MappingLedger::new(config.ledger_path());

        Ok(Self {
            config,
            http,
            store,
            fetcher,
            ledger,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn ledger(&self) -> &MappingLedger {
        &self.ledger
    }

    /// Resolve `count` archive objects from the manifest and process each.
    pub async fn run(&mut self, count: usize) -> IngestResult<RunSummary> {
        let sources = resolve_sources(&self.config, &self.http, count).await?;

        let mut summary = RunSummary::default();
        for source in &sources {
            summary.archives_attempted += 1;
            match self.process_source(source).await {
                Ok(report) => summary.absorb(&report),
                Err(e) => tracing::error!(url = %source.url, "Skipping archive object: {e}"),
            }
        }

        self.finish(summary)
    }

    /// Process archive files already on disk.
    pub async fn run_local(&mut self, paths: &[PathBuf]) -> IngestResult<RunSummary> {
        let mut summary = RunSummary::default();
        for path in paths {
            summary.archives_attempted += 1;
            match self.process_archive(path).await {
                Ok(report) => summary.absorb(&report),
                Err(e) => tracing::error!(path = %path.display(), "Error reading archive: {e}"),
            }
        }

        self.finish(summary)
    }

    fn finish(&self, mut summary: RunSummary) -> IngestResult<RunSummary> {
        self.ledger.flush()?;
        summary.statistics = self.ledger.statistics();

        tracing::info!(
            archives = summary.archives_processed,
            "Processing complete! Total records: {}, Total HTML pages: {}",
            summary.records_seen,
            summary.html_pages
        );
        Ok(summary)
    }

    /// Retrieve one archive object and stream it.
    pub async fn process_source(&mut self, source: &ArchiveSource) -> IngestResult<ArchiveReport> {
        let path = retrieve_archive(&self.http, source).await?;
        let report = self.process_archive(&path).await;

        if !self.config.keep_archives && path == source.local_path {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Could not remove archive {}: {e}", path.display());
            }
        }

        report
    }

    /// Stream one local archive file through classification and extraction.
    pub async fn process_archive(&mut self, path: &Path) -> IngestResult<ArchiveReport> {
        tracing::info!("Starting to parse archive: {}", path.display());

        let mut reader = ArchiveReader::open(path)?;
        let mut report = ArchiveReport::default();

        loop {
            if let Some(limit) = self.config.html_page_limit {
                if report.html_pages >= limit {
                    tracing::info!("Reached HTML page limit of {limit}");
                    break;
                }
            }

            let record = match reader.next() {
                None => break,
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    tracing::warn!(path = %path.display(), "Archive stream ended early: {e}");
                    report.truncated = Some(e.to_string());
                    break;
                }
            };
            report.records_seen += 1;

            match classify(&record) {
                Classification::Html(html) => {
                    report.html_pages += 1;
                    match self.process_html(html).await {
                        Ok(true) => report.pages_persisted += 1,
                        Ok(false) => {}
                        Err(e) => tracing::error!("Error processing HTML record: {e}"),
                    }
                }
                Classification::Discarded(reason) => {
                    tracing::trace!(record_type = %record.record_type, ?reason, "Discarded record");
                }
            }

            if report.records_seen % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Processed {} records, found {} HTML pages",
                    report.records_seen,
                    report.html_pages
                );
            }
        }

        tracing::info!(
            "Parsing complete! Processed {} records, extracted {} HTML pages",
            report.records_seen,
            report.html_pages
        );
        Ok(report)
    }

    /// Store, extract, fetch, and record one HTML page.
    ///
    /// Returns `Ok(false)` when the page had no body and was dropped.
    async fn process_html(&mut self, html: HtmlRecord) -> IngestResult<bool> {
        if html.body.is_empty() {
            tracing::debug!(target_uri = ?html.target_uri, "Skipping empty HTML body");
            return Ok(false);
        }

        let stored = self.store.store_html(&html.body)?;

        let image_urls = match html.target_uri.as_deref() {
            Some(uri) => extract_image_urls(&html.body, uri),
            None => {
                tracing::debug!(html_hash = %stored.hash, "No target URI; skipping image extraction");
                Vec::new()
            }
        };

        let downloaded_images = self
            .fetcher
            .fetch(&image_urls, &stored.hash, &self.store)
            .await;

        tracing::info!(
            target_uri = html.target_uri.as_deref().unwrap_or("-"),
            "Processed HTML page, found {} images, downloaded {}",
            image_urls.len(),
            downloaded_images.len()
        );

        self.ledger.append(ExtractedPage {
            html_hash: stored.hash,
            record_id: html.record_id,
            target_uri: html.target_uri,
            date: html.date,
            html_file: stored.filename,
            html_path: stored.path,
            image_urls,
            downloaded_images,
            extraction_time: Utc::now(),
        })?;

        Ok(true)
    }
}
