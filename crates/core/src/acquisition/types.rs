//! Acquisition results and errors.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::catalog::ProductDescriptor;

/// How the local copy came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionOrigin {
    /// Manifest was already present; nothing was done.
    Cached,
    /// A previously downloaded archive was extracted.
    Extracted,
    /// The archive was downloaded and extracted.
    Downloaded,
}

impl AcquisitionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionOrigin::Cached => "cached",
            AcquisitionOrigin::Extracted => "extracted",
            AcquisitionOrigin::Downloaded => "downloaded",
        }
    }
}

/// A product with an extracted local copy.
#[derive(Debug, Clone)]
pub struct AcquiredProduct {
    pub descriptor: ProductDescriptor,
    /// `<download_dir>/<title>.zip`; deleted after a successful extraction.
    pub archive_path: PathBuf,
    /// `<download_dir>/<title>`.
    pub extracted_path: PathBuf,
    /// `<extracted_path>/<manifest>`; may be missing on unexpected layouts.
    pub manifest_path: PathBuf,
    pub origin: AcquisitionOrigin,
}

/// Errors from the archive fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Download rejected the token: {0}")]
    Unauthorized(String),

    #[error("Download returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Download connection failed: {0}")]
    Connection(String),

    #[error("Download I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt with a fresh token may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Unauthorized(_) | FetchError::Connection(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Io(_) => false,
        }
    }
}

/// Errors from the archive extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Corrupt archive {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Extraction I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Download of {product_id} failed after {attempts} attempts: {source}")]
    Download {
        product_id: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("Extraction of {archive} failed: {source}")]
    Extraction {
        archive: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Product title {0:?} is not a valid file name")]
    InvalidTitle(String),

    #[error("Acquisition I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquisitionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquisitionError::Download { source, .. } => source.is_retryable(),
            AcquisitionError::Auth(e) => e.is_retryable(),
            _ => false,
        }
    }
}
