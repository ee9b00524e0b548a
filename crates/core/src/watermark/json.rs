//! Watermarks as one JSON file per family.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::SatelliteFamily;

use super::types::WatermarkDocument;
use super::{Watermark, WatermarkError, WatermarkStore};

/// Stores `<dir>/<s1|s2>_watermark.json`, replaced atomically on commit.
pub struct JsonWatermarkStore {
    dir: PathBuf,
}

impl JsonWatermarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, family: SatelliteFamily) -> PathBuf {
        self.dir.join(format!("{}_watermark.json", family.dir_name()))
    }
}

async fn read_document(path: &Path) -> Result<Option<WatermarkDocument>, WatermarkError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(WatermarkError::Io(e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| WatermarkError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl WatermarkStore for JsonWatermarkStore {
    async fn load(&self, family: SatelliteFamily) -> Result<Option<Watermark>, WatermarkError> {
        let path = self.path_for(family);
        let Some(doc) = read_document(&path).await? else {
            debug!(family = %family, path = %path.display(), "No watermark yet");
            return Ok(None);
        };
        Watermark::from_document(family, doc)
            .map(Some)
            .map_err(|e| WatermarkError::Corrupt {
                path,
                reason: e.to_string(),
            })
    }

    async fn commit(&self, watermark: &Watermark) -> Result<(), WatermarkError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(watermark.family);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&watermark.to_document())
            .map_err(|e| WatermarkError::Serialize(e.to_string()))?;

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(
            family = %watermark.family,
            files = watermark.seen_ids.len(),
            path = %path.display(),
            "Watermark committed"
        );
        Ok(())
    }
}
