//! Run summaries and pipeline errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::acquisition::AcquisitionOrigin;
use crate::catalog::SatelliteFamily;
use crate::discovery::{RegionFailure, SearchError};
use crate::dispatcher::{StageResult, StageStatus};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every region failed, or the watermark could not be read or written.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Family configuration that validation should have rejected.
    #[error("invalid configuration for {family}: {reason}")]
    Config {
        family: SatelliteFamily,
        reason: String,
    },

    /// A run is already in flight.
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,
}

/// What happened to one new product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub product_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<AcquisitionOrigin>,
    /// Acquisition or dispatch error, if the product did not reach its stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<StageResult>,
}

/// Per-family counters for one run.
#[derive(Debug, Clone, Serialize)]
pub struct FamilySummary {
    pub family: SatelliteFamily,
    pub products_discovered: usize,
    pub products_new: usize,
    /// Downloaded or extracted during this run.
    pub products_acquired: usize,
    /// Already extracted by an earlier run.
    pub products_cached: usize,
    /// Extracted without a manifest; no stages ran.
    pub products_skipped: usize,
    pub products_failed: usize,
    pub stages_computed: usize,
    pub stages_skipped: usize,
    pub stages_failed: usize,
    pub region_failures: Vec<RegionFailure>,
    pub products: Vec<ProductReport>,
}

impl FamilySummary {
    pub fn new(family: SatelliteFamily) -> Self {
        Self {
            family,
            products_discovered: 0,
            products_new: 0,
            products_acquired: 0,
            products_cached: 0,
            products_skipped: 0,
            products_failed: 0,
            stages_computed: 0,
            stages_skipped: 0,
            stages_failed: 0,
            region_failures: Vec::new(),
            products: Vec::new(),
        }
    }

    /// Fold a product's report into the counters.
    pub fn record(&mut self, report: ProductReport) {
        for stage in &report.stages {
            match stage.status {
                StageStatus::Computed { .. } => self.stages_computed += 1,
                StageStatus::Skipped { .. } => self.stages_skipped += 1,
                StageStatus::Failed { .. } => self.stages_failed += 1,
            }
        }
        self.products.push(report);
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub families: Vec<FamilySummary>,
}

impl RunSummary {
    pub fn family(&self, family: SatelliteFamily) -> Option<&FamilySummary> {
        self.families.iter().find(|f| f.family == family)
    }

    pub fn stages_failed(&self) -> usize {
        self.families.iter().map(|f| f.stages_failed).sum()
    }

    pub fn products_failed(&self) -> usize {
        self.families.iter().map(|f| f.products_failed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;
    use std::path::PathBuf;

    #[test]
    fn test_record_counts_stage_outcomes() {
        let mut summary = FamilySummary::new(SatelliteFamily::S2);
        summary.record(ProductReport {
            product_id: "p1".into(),
            title: "t".into(),
            origin: Some(AcquisitionOrigin::Downloaded),
            error: None,
            stages: vec![
                StageResult {
                    stage: StageName::TrueColor,
                    status: StageStatus::Computed {
                        path: PathBuf::from("a"),
                    },
                },
                StageResult {
                    stage: StageName::FalseColorNir,
                    status: StageStatus::Skipped {
                        path: PathBuf::from("b"),
                    },
                },
                StageResult::failed(StageName::VegetationIndex, "boom"),
            ],
        });

        assert_eq!(summary.stages_computed, 1);
        assert_eq!(summary.stages_skipped, 1);
        assert_eq!(summary.stages_failed, 1);
        assert_eq!(summary.products.len(), 1);
    }

    #[test]
    fn test_summary_serializes_stage_status() {
        let result = StageResult::failed(StageName::Ratio, "bad band");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "bad band");
        assert_eq!(json["stage"], "RATIO");
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::AlreadyRunning;
        assert_eq!(err.to_string(), "a pipeline run is already in progress");
    }
}
