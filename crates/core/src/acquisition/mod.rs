//! Product acquisition: download, extract, locate the manifest.

mod extractor;
mod fetcher;
mod manager;
mod types;

pub use extractor::{ArchiveExtractor, ZipExtractor};
pub use fetcher::{ArchiveFetcher, HttpArchiveFetcher};
pub use manager::AcquisitionManager;
pub use types::*;
