//! Archive extraction.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::ExtractError;

/// Unpacks a downloaded archive.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest_dir`. Partial output is left in place on
    /// failure.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError>;
}

/// Zip extraction on the blocking pool.
#[derive(Debug, Default, Clone)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn extract_blocking(archive: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let corrupt = |reason: String| ExtractError::Corrupt {
        path: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;
    std::fs::create_dir_all(dest_dir)?;
    zip.extract(dest_dir).map_err(|e| match e {
        zip::result::ZipError::Io(io) => ExtractError::Io(io),
        other => corrupt(other.to_string()),
    })?;
    Ok(zip.len())
}

#[async_trait]
impl ArchiveExtractor for ZipExtractor {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
        let archive_owned: PathBuf = archive.to_path_buf();
        let dest_owned: PathBuf = dest_dir.to_path_buf();

        let entries = tokio::task::spawn_blocking(move || extract_blocking(&archive_owned, &dest_owned))
            .await
            .map_err(|e| ExtractError::Io(std::io::Error::other(e.to_string())))??;

        debug!(archive = %archive.display(), entries, "Archive extracted");
        Ok(())
    }
}
