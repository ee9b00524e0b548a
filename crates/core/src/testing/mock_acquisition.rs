//! Mock archive fetcher and extractor for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::acquisition::{ArchiveExtractor, ArchiveFetcher, ExtractError, FetchError};
use crate::auth::AccessToken;

/// A recorded download for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDownload {
    pub product_id: String,
    /// Token the download was made with.
    pub token: String,
    pub dest: PathBuf,
}

/// Writes a small placeholder archive at the destination.
#[derive(Debug, Default)]
pub struct MockArchiveFetcher {
    downloads: Arc<RwLock<Vec<RecordedDownload>>>,
    next_error: Arc<RwLock<Option<FetchError>>>,
    fail_always: Arc<RwLock<bool>>,
}

impl MockArchiveFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts made, failed ones included.
    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    pub async fn recorded_downloads(&self) -> Vec<RecordedDownload> {
        self.downloads.read().await.clone()
    }

    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every download with a connection error.
    pub async fn fail_always(&self, fail: bool) {
        *self.fail_always.write().await = fail;
    }
}

#[async_trait]
impl ArchiveFetcher for MockArchiveFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(
        &self,
        product_id: &str,
        token: &AccessToken,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        self.downloads.write().await.push(RecordedDownload {
            product_id: product_id.to_string(),
            token: token.secret().to_string(),
            dest: dest.to_path_buf(),
        });

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if *self.fail_always.read().await {
            return Err(FetchError::Connection("mock connection reset".to_string()));
        }

        let body = format!("archive:{}", product_id);
        tokio::fs::write(dest, &body).await?;
        Ok(body.len() as u64)
    }
}

/// Manifest names written into every extracted product.
const MANIFESTS: [&str; 3] = ["manifest.safe", "MTD_MSIL2A.xml", "MTD_MSIL1C.xml"];

/// Creates `<dest>/<archive name without .zip>/` holding the manifests of
/// every supported product layout.
#[derive(Debug, Default)]
pub struct MockArchiveExtractor {
    extracted: Arc<RwLock<Vec<PathBuf>>>,
    next_error: Arc<RwLock<Option<ExtractError>>>,
    omit_manifest: Arc<RwLock<bool>>,
}

impl MockArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn extract_count(&self) -> usize {
        self.extracted.read().await.len()
    }

    pub async fn set_next_error(&self, error: ExtractError) {
        *self.next_error.write().await = Some(error);
    }

    /// Extract products without any manifest file.
    pub async fn omit_manifest(&self, omit: bool) {
        *self.omit_manifest.write().await = omit;
    }
}

#[async_trait]
impl ArchiveExtractor for MockArchiveExtractor {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
        self.extracted.write().await.push(archive.to_path_buf());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let name = archive
            .file_stem()
            .ok_or_else(|| ExtractError::Corrupt {
                path: archive.to_path_buf(),
                reason: "archive has no name".to_string(),
            })?;
        let product_dir = dest_dir.join(name);
        tokio::fs::create_dir_all(&product_dir).await?;
        if !*self.omit_manifest.read().await {
            for manifest in MANIFESTS {
                tokio::fs::write(product_dir.join(manifest), b"<manifest/>").await?;
            }
        }
        Ok(())
    }
}
