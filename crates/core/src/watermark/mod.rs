//! Persistent discovery cursor per satellite family.

mod json;
mod types;

pub use json::JsonWatermarkStore;
pub use types::Watermark;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::SatelliteFamily;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Watermark I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watermark file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to serialize watermark: {0}")]
    Serialize(String),
}

/// Storage for watermarks. Reads happen once per pass, writes once at the end.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn load(&self, family: SatelliteFamily) -> Result<Option<Watermark>, WatermarkError>;

    /// Replace the stored watermark for `watermark.family`.
    async fn commit(&self, watermark: &Watermark) -> Result<(), WatermarkError>;
}
