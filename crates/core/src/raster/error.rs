//! Error types for the raster module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from raster I/O and band math.
#[derive(Debug, Error)]
pub enum RasterError {
    /// A GDAL tool binary was not found.
    #[error("Raster tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The dataset or subdataset could not be opened.
    #[error("Failed to open dataset {source_name}: {reason}")]
    OpenFailed { source_name: String, reason: String },

    /// Requested subdataset index is not present.
    #[error("Subdataset {index} not found in {source_name}")]
    SubdatasetNotFound { source_name: String, index: usize },

    /// Requested band index is outside 1..=band_count.
    #[error("Band {band} out of range (dataset has {band_count} bands)")]
    BandOutOfRange { band: usize, band_count: usize },

    /// Arrays that must align have different dimensions.
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// The requested window has no pixels.
    #[error("Empty read window")]
    EmptyWindow,

    /// Coordinate transformation failed.
    #[error("Projection error: {0}")]
    Projection(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    CommandFailed {
        tool: String,
        reason: String,
        stderr: Option<String>,
    },

    /// An external tool exceeded the configured timeout.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Tool output could not be interpreted.
    #[error("Failed to parse raster metadata: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    pub fn command_failed(tool: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let reason = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("non-zero exit status")
            .to_string();
        RasterError::CommandFailed {
            tool: tool.into(),
            reason,
            stderr: Some(stderr),
        }
    }
}
