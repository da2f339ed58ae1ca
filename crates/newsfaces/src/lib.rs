//! NewsFaces ingest: web-archive record streaming, HTML image extraction,
//! and content-addressed image storage.

pub mod archive;
pub mod classifier;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod http;
pub mod ledger;
pub mod locator;
pub mod pipeline;
pub mod store;
pub mod types;

pub use archive::ArchiveReader;
pub use classifier::{classify, Classification, HtmlRecord};
pub use config::IngestConfig;
pub use extractor::extract_image_urls;
pub use fetcher::ImageFetcher;
pub use http::HttpClient;
pub use ledger::MappingLedger;
pub use locator::{resolve_sources, retrieve_archive};
pub use pipeline::Pipeline;
pub use store::{content_hash, ContentStore};
pub use types::*;
