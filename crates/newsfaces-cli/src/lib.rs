//! NewsFaces command-line driver: argument resolution and result rendering.

pub mod config;
pub mod report;

pub use config::{resolve_manifest, resolve_output_dir, IngestArgs};
