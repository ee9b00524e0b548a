//! End-to-end pipeline runs against in-memory collaborators.
//!
//! Covers first and repeated discovery, idempotent re-processing, windowed
//! reads clipped at the dataset edge, overlapping boxes and partial region
//! failures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use sentinel_core::{
    acquisition::AcquisitionManager,
    auth::SharedToken,
    catalog::{BoundingBox, CatalogError, ProductDescriptor, SatelliteFamily},
    config::{Config, FamilyConfig, PathsConfig},
    orchestrator::PipelineRunner,
    raster::{projection::WGS84, GeoTransform, PixelWindow},
    stage::{StageName, StageScope},
    testing::{
        fixtures, MemoryRasterBackend, MockArchiveExtractor, MockArchiveFetcher, MockCatalog,
        MockTokenProvider,
    },
    watermark::{JsonWatermarkStore, WatermarkStore},
};

const BOX_A: &str = "10,45,11,46";
const BOX_B: &str = "12,44,13,45";
const BOX_C: &str = "10.5,45.5,11.5,46.5";

fn bbox(s: &str) -> BoundingBox {
    s.parse().expect("valid box")
}

/// Everything a run touches, rooted in one temp dir.
struct TestHarness {
    temp_dir: TempDir,
    config: Config,
    catalog: Arc<MockCatalog>,
    fetcher: Arc<MockArchiveFetcher>,
    extractor: Arc<MockArchiveExtractor>,
    tokens: Arc<MockTokenProvider>,
    backend: Arc<MemoryRasterBackend>,
    watermarks: Arc<JsonWatermarkStore>,
}

impl TestHarness {
    fn new(configure: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config {
            paths: PathsConfig::rooted_at(temp_dir.path()),
            ..Config::default()
        };
        configure(&mut config);
        let watermarks = Arc::new(JsonWatermarkStore::new(&config.paths.watermark_dir));

        Self {
            temp_dir,
            config,
            catalog: Arc::new(MockCatalog::new()),
            fetcher: Arc::new(MockArchiveFetcher::new()),
            extractor: Arc::new(MockArchiveExtractor::new()),
            tokens: Arc::new(MockTokenProvider::new()),
            backend: Arc::new(MemoryRasterBackend::new()),
            watermarks,
        }
    }

    fn s2(stages: &[StageName]) -> Self {
        Self::new(|c| c.s2 = FamilyConfig::enabled_with_boxes(&[BOX_A]).with_stages(stages))
    }

    /// A fresh runner over the shared collaborators, as a new process would build.
    fn runner(&self) -> PipelineRunner {
        let acquisition = AcquisitionManager::new(
            self.fetcher.clone(),
            self.extractor.clone(),
            Arc::new(SharedToken::new(self.tokens.clone())),
            &self.config.paths.download_dir,
        );
        PipelineRunner::new(
            self.config.clone(),
            self.catalog.clone(),
            self.watermarks.clone(),
            acquisition,
            self.backend.clone(),
        )
    }

    fn manifest_for(&self, product: &ProductDescriptor) -> PathBuf {
        self.config
            .paths
            .download_dir
            .join(&product.title)
            .join(product.manifest_file_name())
    }

    async fn register_s2(&self, products: &[ProductDescriptor]) {
        for p in products {
            self.backend.add_s2_product(&self.manifest_for(p), 10, 10).await;
        }
    }

    fn output(&self, relative: &str) -> PathBuf {
        self.config.paths.output_dir.join(relative)
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

#[tokio::test]
async fn test_first_run_treats_everything_as_new() {
    let h = TestHarness::s2(&[StageName::TrueColor, StageName::FalseColorNir]);
    let products = fixtures::s2_products(&["id-1", "id-2", "id-3"], bbox(BOX_A));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_A), products).await;

    let summary = h.runner().run().await.expect("run succeeds");

    let s2 = summary.family(SatelliteFamily::S2).expect("s2 summary");
    assert_eq!(s2.products_discovered, 3);
    assert_eq!(s2.products_new, 3);
    assert_eq!(s2.products_acquired, 3);
    assert_eq!(s2.stages_computed, 6);
    assert_eq!(s2.stages_failed, 0);

    let watermark = h
        .watermarks
        .load(SatelliteFamily::S2)
        .await
        .unwrap()
        .expect("watermark committed");
    assert_eq!(watermark.seen_ids.len(), 3);

    // One token per transfer, archives gone after extraction.
    assert_eq!(h.fetcher.download_count().await, 3);
    assert_eq!(
        h.tokens.issue_count().await + h.tokens.refresh_count().await,
        3
    );
    assert!(std::fs::read_dir(&h.config.paths.download_dir)
        .unwrap()
        .filter_map(Result::ok)
        .all(|e| e.path().extension().map_or(true, |ext| ext != "zip")));

    assert!(h.output("s2/tci/T32TQM-20240614T101031Z-TCI.tif").exists());
    assert!(h.output("s2/nirfc/T32TQM-20240614T101033Z-NIRFC.tif").exists());
}

#[tokio::test]
async fn test_watermark_file_schema() {
    let h = TestHarness::s2(&[StageName::TrueColor]);
    let products = fixtures::s2_products(&["id-1", "id-2"], bbox(BOX_A));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_A), products).await;

    h.runner().run().await.unwrap();

    let raw = std::fs::read_to_string(h.root().join("s2_watermark.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let mut files: Vec<&str> = doc["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    files.sort();
    assert_eq!(files, vec!["id-1", "id-2"]);
    assert!(doc["time"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_second_run_with_watermark_finds_nothing_new() {
    let h = TestHarness::s2(&[StageName::TrueColor]);
    let products = fixtures::s2_products(&["id-1", "id-2", "id-3"], bbox(BOX_A));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_A), products).await;
    h.runner().run().await.unwrap();

    let downloads = h.fetcher.download_count().await;
    let extracts = h.extractor.extract_count().await;
    let opens = h.backend.open_count().await;

    let summary = h.runner().run().await.unwrap();

    let s2 = summary.family(SatelliteFamily::S2).unwrap();
    assert_eq!(s2.products_discovered, 3);
    assert_eq!(s2.products_new, 0);
    assert!(s2.products.is_empty());
    assert_eq!(h.fetcher.download_count().await, downloads);
    assert_eq!(h.extractor.extract_count().await, extracts);
    assert_eq!(h.backend.open_count().await, opens);
}

#[tokio::test]
async fn test_reprocessing_is_idempotent_without_watermark() {
    let h = TestHarness::s2(&StageName::defaults_for(SatelliteFamily::S2));
    let products = fixtures::s2_products(&["id-1", "id-2"], bbox(BOX_A));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_A), products).await;
    h.runner().run().await.unwrap();

    let downloads = h.fetcher.download_count().await;
    let writes = h.backend.write_count().await;
    let token_calls = h.tokens.issue_count().await + h.tokens.refresh_count().await;
    // Lose the cursor, as after a crash before the commit.
    std::fs::remove_file(h.root().join("s2_watermark.json")).unwrap();

    let summary = h.runner().run().await.unwrap();

    let s2 = summary.family(SatelliteFamily::S2).unwrap();
    assert_eq!(s2.products_new, 2);
    assert_eq!(s2.products_cached, 2);
    assert_eq!(s2.stages_computed, 0);
    assert_eq!(s2.stages_skipped, 8);
    assert_eq!(h.fetcher.download_count().await, downloads);
    assert_eq!(
        h.tokens.issue_count().await + h.tokens.refresh_count().await,
        token_calls
    );
    assert_eq!(h.backend.write_count().await, writes);
}

#[tokio::test]
async fn test_box_window_clipped_to_dataset_edge() {
    let h = TestHarness::new(|c| {
        c.s2 = FamilyConfig::enabled_with_boxes(&[BOX_A])
            .with_stages(&[StageName::TrueColor])
            .with_scope(StageScope::Box)
    });
    let product = fixtures::s2_product("id-1", bbox(BOX_A));
    // Covers lon 10.5..11.5, lat 45.5..46.5: the box overhangs west and south.
    h.backend
        .add_s2_product_with_geometry(
            &h.manifest_for(&product),
            8,
            8,
            GeoTransform::north_up(10.5, 46.5, 0.125, 0.125),
            WGS84,
        )
        .await;
    h.catalog.set_region_results(bbox(BOX_A), vec![product]).await;

    let summary = h.runner().run().await.unwrap();
    assert_eq!(summary.stages_failed(), 0);

    let expected = PixelWindow {
        col_off: 0,
        row_off: 4,
        width: 4,
        height: 4,
    };
    assert_eq!(h.backend.recorded_windows().await, vec![Some(expected)]);

    let out = h.output("s2/tci/10_45_11_46-T32TQM-20240614T101031Z-TCI.tif");
    let image = h.backend.written_image(&out).await.expect("image written");
    assert_eq!((image.profile.width, image.profile.height), (4, 4));
    assert_eq!(image.profile.transform.0[0], 10.5);
    assert_eq!(image.profile.transform.0[3], 46.0);
}

#[tokio::test]
async fn test_overlapping_boxes_each_get_an_output() {
    let h = TestHarness::new(|c| {
        c.s2 = FamilyConfig::enabled_with_boxes(&[BOX_A, BOX_C])
            .with_stages(&[StageName::TrueColor])
            .with_scope(StageScope::Box)
    });
    let in_a = fixtures::s2_product("shared", bbox(BOX_A));
    let in_c = fixtures::s2_product("shared", bbox(BOX_C));
    h.register_s2(std::slice::from_ref(&in_a)).await;
    h.catalog.set_region_results(bbox(BOX_A), vec![in_a]).await;
    h.catalog.set_region_results(bbox(BOX_C), vec![in_c]).await;

    let summary = h.runner().run().await.unwrap();

    let s2 = summary.family(SatelliteFamily::S2).unwrap();
    assert_eq!(s2.products_discovered, 1);
    assert_eq!(s2.products_new, 1);
    assert_eq!(s2.stages_computed, 2);
    assert_eq!(s2.stages_failed, 0);
    assert_eq!(h.fetcher.download_count().await, 1);

    assert!(h
        .output("s2/tci/10_45_11_46-T32TQM-20240614T101031Z-TCI.tif")
        .exists());
    assert!(h
        .output("s2/tci/10.5_45.5_11.5_46.5-T32TQM-20240614T101031Z-TCI.tif")
        .exists());

    let watermark = h.watermarks.load(SatelliteFamily::S2).await.unwrap().unwrap();
    let ids: Vec<&str> = watermark.seen_ids.iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["shared"]);
}

#[tokio::test]
async fn test_partial_region_failure_keeps_other_region() {
    let h = TestHarness::new(|c| {
        c.s2 = FamilyConfig::enabled_with_boxes(&[BOX_A, BOX_B]).with_stages(&[StageName::TrueColor])
    });
    h.catalog
        .fail_region(
            bbox(BOX_A),
            CatalogError::Status {
                status: 500,
                body: "internal error".into(),
            },
        )
        .await;
    let products = fixtures::s2_products(&["b-1", "b-2"], bbox(BOX_B));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_B), products).await;

    let summary = h.runner().run().await.unwrap();

    let s2 = summary.family(SatelliteFamily::S2).unwrap();
    assert_eq!(s2.products_new, 2);
    assert_eq!(s2.region_failures.len(), 1);
    assert_eq!(s2.region_failures[0].region, bbox(BOX_A));
    assert_eq!(s2.stages_computed, 2);

    let watermark = h.watermarks.load(SatelliteFamily::S2).await.unwrap().unwrap();
    let ids: Vec<&str> = watermark.seen_ids.iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["b-1", "b-2"]);
}

#[tokio::test]
async fn test_s1_run_cleans_scratch() {
    let h = TestHarness::new(|c| {
        c.s1 = FamilyConfig::enabled_with_boxes(&[BOX_A]).with_stages(&[
            StageName::PolarizationVv,
            StageName::PolarizationVh,
            StageName::Ratio,
            StageName::Difference,
        ])
    });
    let product = fixtures::s1_product("s1-1", bbox(BOX_A));
    h.backend
        .add_s1_product(&h.manifest_for(&product), 6, 4)
        .await;
    h.catalog.set_region_results(bbox(BOX_A), vec![product]).await;

    let summary = h.runner().run().await.unwrap();

    let s1 = summary.family(SatelliteFamily::S1).unwrap();
    assert_eq!(s1.stages_computed, 4);
    // VV and VH prepared once each, shared by all four stages.
    assert_eq!(h.backend.reproject_count().await, 2);
    assert!(h
        .output("s1/diffvvvh/S1_20240101T053012_20240101T053037-DIFFERENCE.tif")
        .exists());
    let scratch_left = std::fs::read_dir(&h.config.paths.scratch_dir)
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(scratch_left, 0);
}

#[tokio::test]
async fn test_missing_manifest_skips_product() {
    let h = TestHarness::s2(&[StageName::TrueColor]);
    h.extractor.omit_manifest(true).await;
    let products = fixtures::s2_products(&["id-1"], bbox(BOX_A));
    h.catalog.set_region_results(bbox(BOX_A), products).await;

    let summary = h.runner().run().await.unwrap();

    let s2 = summary.family(SatelliteFamily::S2).unwrap();
    assert_eq!(s2.products_skipped, 1);
    assert_eq!(s2.stages_computed, 0);
    assert!(s2.products[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Manifest missing"));
    assert_eq!(h.backend.open_count().await, 0);
}

#[tokio::test]
async fn test_web_mercator_copies_for_s2_by_default() {
    let h = TestHarness::s2(&[StageName::TrueColor]);
    let products = fixtures::s2_products(&["id-1"], bbox(BOX_A));
    h.register_s2(&products).await;
    h.catalog.set_region_results(bbox(BOX_A), products).await;

    h.runner().run().await.unwrap();

    assert!(h
        .output("s2/tci/T32TQM-20240614T101031Z-TCI-3857.tif")
        .exists());
}
