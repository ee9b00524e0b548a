//! Testing utilities and in-memory collaborators.
//!
//! Every external collaborator of the pipeline has a double here, so whole
//! runs can be exercised without network access or GDAL.
//!
//! # Example
//!
//! ```rust,ignore
//! use sentinel_core::testing::{fixtures, MockCatalog, MemoryRasterBackend};
//!
//! let region = "10,45,11,46".parse()?;
//! let catalog = MockCatalog::new();
//! catalog.set_region_results(region, fixtures::s2_products(&["a", "b"], region)).await;
//!
//! let backend = MemoryRasterBackend::new();
//! backend.add_s2_product(&manifest, 10, 10).await;
//! ```

mod memory_raster;
mod memory_watermark;
mod mock_acquisition;
mod mock_auth;
mod mock_catalog;

pub use memory_raster::MemoryRasterBackend;
pub use memory_watermark::MemoryWatermarkStore;
pub use mock_acquisition::{MockArchiveExtractor, MockArchiveFetcher, RecordedDownload};
pub use mock_auth::MockTokenProvider;
pub use mock_catalog::MockCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use crate::acquisition::{AcquiredProduct, AcquisitionOrigin};
    use crate::catalog::{BoundingBox, ProductDescriptor, SatelliteFamily};

    /// Sensing time of the first fixture product.
    fn base_time() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 14)
            .and_then(|d| d.and_hms_opt(10, 10, 31))
            .unwrap_or_default()
    }

    /// S2 L2A title sensed `offset_secs` after the base time, tile T32TQM.
    pub fn s2_title(offset_secs: i64) -> String {
        let sensed = base_time() + Duration::seconds(offset_secs);
        format!(
            "S2A_MSIL2A_{}_N0510_R022_T32TQM_20240614T161608.SAFE",
            sensed.format("%Y%m%dT%H%M%S")
        )
    }

    /// A Sentinel-2 L2A descriptor titled
    /// `S2A_MSIL2A_20240614T101031_N0510_R022_T32TQM_20240614T161608.SAFE`.
    pub fn s2_product(id: &str, region: BoundingBox) -> ProductDescriptor {
        ProductDescriptor {
            id: id.to_string(),
            title: s2_title(0),
            family: SatelliteFamily::S2,
            product_type: "L2A".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 6, 14, 16, 16, 8).single().unwrap_or_default(),
            cloud_cover: Some(1.5),
            region,
        }
    }

    /// S2 descriptors with distinct titles, one second apart.
    pub fn s2_products(ids: &[&str], region: BoundingBox) -> Vec<ProductDescriptor> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let mut product = s2_product(id, region);
                product.title = s2_title(i as i64);
                product
            })
            .collect()
    }

    /// A Sentinel-1 GRD descriptor titled
    /// `S1A_IW_GRDH_1SDV_20240101T053012_20240101T053037_051922_064618_1B7E.SAFE`.
    pub fn s1_product(id: &str, region: BoundingBox) -> ProductDescriptor {
        ProductDescriptor {
            id: id.to_string(),
            title: "S1A_IW_GRDH_1SDV_20240101T053012_20240101T053037_051922_064618_1B7E.SAFE"
                .to_string(),
            family: SatelliteFamily::S1,
            product_type: "GRD".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).single().unwrap_or_default(),
            cloud_cover: None,
            region,
        }
    }

    /// The `10,45,11,46` box used across fixtures.
    pub fn region() -> BoundingBox {
        BoundingBox {
            west: 10.0,
            south: 45.0,
            east: 11.0,
            north: 46.0,
        }
    }

    /// An already extracted product under `<root>/download`, manifest on disk.
    pub fn acquired(root: &Path, descriptor: ProductDescriptor) -> AcquiredProduct {
        let download = root.join("download");
        let extracted = download.join(&descriptor.title);
        let manifest = extracted.join(descriptor.manifest_file_name());
        let _ = std::fs::create_dir_all(&extracted);
        let _ = std::fs::write(&manifest, b"<manifest/>");
        AcquiredProduct {
            archive_path: download.join(format!("{}.zip", descriptor.title)),
            extracted_path: extracted,
            manifest_path: manifest,
            origin: AcquisitionOrigin::Cached,
            descriptor,
        }
    }

    pub fn acquired_s2(root: &Path) -> AcquiredProduct {
        acquired(root, s2_product("s2-product", region()))
    }

    pub fn acquired_s1(root: &Path) -> AcquiredProduct {
        acquired(root, s1_product("s1-product", region()))
    }
}
