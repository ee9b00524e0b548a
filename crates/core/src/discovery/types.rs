//! Discovery inputs, outputs and errors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{BoundingBox, ProductDescriptor, SatelliteFamily};
use crate::config::FamilyConfig;
use crate::watermark::{Watermark, WatermarkError};

/// Query parameters shared by every region of one family's pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub product_type: String,
    pub max_cloud_cover: Option<f64>,
    /// Page size.
    pub max_records: u32,
    /// Pages fetched per region at most.
    pub max_pages: u32,
    pub sort_param: String,
    pub sort_order: String,
    /// Search floor when the family has no watermark.
    pub default_start: DateTime<Utc>,
}

impl SearchParams {
    pub fn from_family_config(
        family: SatelliteFamily,
        config: &FamilyConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            product_type: config.product_type_for(family),
            max_cloud_cover: config.cloud_cover_for(family),
            max_records: config.max_records,
            max_pages: config.max_pages,
            sort_param: config.sort_param.clone(),
            sort_order: config.sort_order.clone(),
            default_start: config.default_start(now),
        }
    }
}

/// A region whose search failed during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionFailure {
    pub region: BoundingBox,
    pub error: String,
}

/// Result of one discovery pass.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub family: SatelliteFamily,
    /// Products not seen by the previous pass, in first-seen order.
    pub new_products: Vec<ProductDescriptor>,
    /// The watermark that was committed for this pass.
    pub watermark: Watermark,
    /// Distinct products returned across all successful regions.
    pub total_returned: usize,
    pub region_failures: Vec<RegionFailure>,
    /// Regions each returned id was found under, before deduplication.
    pub product_regions: HashMap<String, Vec<BoundingBox>>,
}

impl Discovery {
    /// The regions `product` was returned under, or its own region if unknown.
    pub fn regions_for(&self, product: &ProductDescriptor) -> Vec<BoundingBox> {
        self.product_regions
            .get(&product.id)
            .filter(|regions| !regions.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![product.region])
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No regions configured for {0}")]
    NoRegions(SatelliteFamily),

    #[error("All {} region searches for {family} failed", failures.len())]
    AllRegionsFailed {
        family: SatelliteFamily,
        failures: Vec<RegionFailure>,
    },

    #[error(transparent)]
    Watermark(#[from] WatermarkError),
}
