//! In-memory watermark store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::SatelliteFamily;
use crate::watermark::{Watermark, WatermarkError, WatermarkStore};

/// Watermark store backed by a map, with commit counting and failure injection.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    watermarks: Arc<RwLock<HashMap<SatelliteFamily, Watermark>>>,
    commits: Arc<RwLock<usize>>,
    fail_commits: Arc<RwLock<bool>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a watermark without counting it as a commit.
    pub async fn put(&self, watermark: Watermark) {
        self.watermarks
            .write()
            .await
            .insert(watermark.family, watermark);
    }

    pub async fn get(&self, family: SatelliteFamily) -> Option<Watermark> {
        self.watermarks.read().await.get(&family).cloned()
    }

    pub async fn remove(&self, family: SatelliteFamily) {
        self.watermarks.write().await.remove(&family);
    }

    pub async fn commit_count(&self) -> usize {
        *self.commits.read().await
    }

    pub async fn fail_commits(&self, fail: bool) {
        *self.fail_commits.write().await = fail;
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn load(&self, family: SatelliteFamily) -> Result<Option<Watermark>, WatermarkError> {
        Ok(self.get(family).await)
    }

    async fn commit(&self, watermark: &Watermark) -> Result<(), WatermarkError> {
        if *self.fail_commits.read().await {
            return Err(WatermarkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock commit failure",
            )));
        }
        self.put(watermark.clone()).await;
        *self.commits.write().await += 1;
        Ok(())
    }
}
