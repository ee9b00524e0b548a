//! Dispatch results and errors.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::stage::{StageName, StageOutcome, StageScope};

/// Per-product dispatch settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchOptions {
    /// `Box` restricts reads to the product's query region and prefixes
    /// output names with the region.
    pub scope: StageScope,
    pub web_mercator_copy: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            scope: StageScope::Tile,
            web_mercator_copy: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Computed { path: PathBuf },
    Skipped { path: PathBuf },
    Failed { error: String },
}

/// Outcome of one stage within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage: StageName,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl StageResult {
    pub fn from_outcome(outcome: StageOutcome) -> Self {
        match outcome {
            StageOutcome::Computed(a) => Self {
                stage: a.stage,
                status: StageStatus::Computed { path: a.path },
            },
            StageOutcome::Skipped(a) => Self {
                stage: a.stage,
                status: StageStatus::Skipped { path: a.path },
            },
        }
    }

    pub fn failed(stage: StageName, error: impl ToString) -> Self {
        Self {
            stage,
            status: StageStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed { .. })
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.status {
            StageStatus::Computed { .. } => "computed",
            StageStatus::Skipped { .. } => "skipped",
            StageStatus::Failed { .. } => "failed",
        }
    }
}

/// Product-level failures; stage failures never surface here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Manifest missing for {product_id}: {path}")]
    MissingManifest { product_id: String, path: PathBuf },

    #[error("Cannot derive output name for {product_id} from title {title:?}")]
    InvalidTitle { product_id: String, title: String },

    #[error("Dispatch I/O error: {0}")]
    Io(#[from] std::io::Error),
}
