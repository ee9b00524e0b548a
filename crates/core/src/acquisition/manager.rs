//! Download-if-absent, then extract.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::auth::SharedToken;
use crate::catalog::ProductDescriptor;
use crate::metrics;

use super::{
    AcquiredProduct, AcquisitionError, AcquisitionOrigin, ArchiveExtractor, ArchiveFetcher,
};

/// Transfers per product: the first try plus one retry with a fresh token.
const DOWNLOAD_ATTEMPTS: u32 = 2;

/// Ensures each product has an extracted copy under the download directory.
pub struct AcquisitionManager {
    fetcher: Arc<dyn ArchiveFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    token: Arc<SharedToken>,
    download_dir: PathBuf,
}

impl AcquisitionManager {
    pub fn new(
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn ArchiveExtractor>,
        token: Arc<SharedToken>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            token,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Canonical `(archive, extracted, manifest)` paths for a product.
    pub fn local_paths(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<(PathBuf, PathBuf, PathBuf), AcquisitionError> {
        let title = descriptor.title.as_str();
        let is_plain_name = !title.is_empty()
            && Path::new(title).file_name().and_then(|n| n.to_str()) == Some(title);
        if !is_plain_name {
            return Err(AcquisitionError::InvalidTitle(descriptor.title.clone()));
        }
        let archive = self.download_dir.join(format!("{}.zip", title));
        let extracted = self.download_dir.join(title);
        let manifest = extracted.join(descriptor.manifest_file_name());
        Ok((archive, extracted, manifest))
    }

    /// Make sure an extracted copy of `descriptor` exists locally.
    ///
    /// No network traffic happens when the manifest or the archive is
    /// already on disk.
    pub async fn acquire(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<AcquiredProduct, AcquisitionError> {
        let result = self.acquire_inner(descriptor).await;
        let label = match &result {
            Ok(p) => p.origin.as_str(),
            Err(_) => "failed",
        };
        metrics::ACQUISITIONS_TOTAL.with_label_values(&[label]).inc();
        result
    }

    async fn acquire_inner(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<AcquiredProduct, AcquisitionError> {
        let (archive, extracted, manifest) = self.local_paths(descriptor)?;
        let product = |origin| AcquiredProduct {
            descriptor: descriptor.clone(),
            archive_path: archive.clone(),
            extracted_path: extracted.clone(),
            manifest_path: manifest.clone(),
            origin,
        };

        if tokio::fs::try_exists(&manifest).await? {
            debug!(product_id = %descriptor.id, path = %extracted.display(), "Already extracted");
            return Ok(product(AcquisitionOrigin::Cached));
        }

        tokio::fs::create_dir_all(&self.download_dir).await?;

        let origin = if tokio::fs::try_exists(&archive).await? {
            info!(product_id = %descriptor.id, archive = %archive.display(), "Archive present, extracting");
            AcquisitionOrigin::Extracted
        } else {
            self.download(descriptor, &archive).await?;
            AcquisitionOrigin::Downloaded
        };

        self.extractor
            .extract(&archive, &self.download_dir)
            .await
            .map_err(|source| AcquisitionError::Extraction {
                archive: archive.clone(),
                source,
            })?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!(archive = %archive.display(), error = %e, "Failed to delete extracted archive");
        }

        if !tokio::fs::try_exists(&manifest).await? {
            warn!(
                product_id = %descriptor.id,
                manifest = %manifest.display(),
                "Extracted product has no manifest"
            );
        }

        info!(product_id = %descriptor.id, title = %descriptor.title, origin = origin.as_str(), "Product acquired");
        Ok(product(origin))
    }

    /// Download with a fresh token, retrying once with another fresh token.
    async fn download(
        &self,
        descriptor: &ProductDescriptor,
        archive: &Path,
    ) -> Result<(), AcquisitionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();

            let outcome = match self.token.fresh().await {
                Ok(token) => self
                    .fetcher
                    .download(&descriptor.id, &token, archive)
                    .await
                    .map_err(|source| AcquisitionError::Download {
                        product_id: descriptor.id.clone(),
                        attempts: attempt,
                        source,
                    }),
                Err(e) => Err(AcquisitionError::Auth(e)),
            };

            let elapsed = started.elapsed().as_secs_f64();
            match outcome {
                Ok(bytes) => {
                    metrics::DOWNLOAD_DURATION
                        .with_label_values(&["success"])
                        .observe(elapsed);
                    info!(product_id = %descriptor.id, bytes, attempt, "Archive downloaded");
                    return Ok(());
                }
                Err(e) => {
                    metrics::DOWNLOAD_DURATION
                        .with_label_values(&["failed"])
                        .observe(elapsed);
                    if attempt >= DOWNLOAD_ATTEMPTS || !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(product_id = %descriptor.id, attempt, error = %e, "Download failed, retrying with a fresh token");
                    metrics::DOWNLOAD_RETRIES.inc();
                }
            }
        }
    }
}
