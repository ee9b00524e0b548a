//! One pipeline run: discover, acquire, dispatch, per enabled family.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::acquisition::{AcquiredProduct, AcquisitionError, AcquisitionManager, AcquisitionOrigin};
use crate::catalog::{BoundingBox, CatalogClient, ProductDescriptor, SatelliteFamily};
use crate::config::Config;
use crate::discovery::{SearchCoordinator, SearchParams};
use crate::dispatcher::{DispatchError, DispatchOptions, StageDispatcher, StageResult};
use crate::metrics;
use crate::raster::{ColorRamp, RasterBackend};
use crate::stage::{StageRunner, StageSpec};
use crate::watermark::WatermarkStore;

use super::types::{FamilySummary, PipelineError, ProductReport, RunSummary};

/// Drives discovery, acquisition and stage dispatch for every enabled family.
pub struct PipelineRunner {
    config: Config,
    coordinator: SearchCoordinator,
    acquisition: Arc<AcquisitionManager>,
    backend: Arc<dyn RasterBackend>,
    color_ramp: ColorRamp,
}

impl PipelineRunner {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        watermarks: Arc<dyn WatermarkStore>,
        acquisition: AcquisitionManager,
        backend: Arc<dyn RasterBackend>,
    ) -> Self {
        let coordinator = SearchCoordinator::new(catalog, watermarks)
            .with_max_parallel_regions(config.runner.max_parallel_regions);
        Self {
            config,
            coordinator,
            acquisition: Arc::new(acquisition),
            backend,
            color_ramp: ColorRamp::default(),
        }
    }

    pub fn with_color_ramp(mut self, ramp: ColorRamp) -> Self {
        self.color_ramp = ramp;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one run under a fresh run id.
    ///
    /// Product and stage failures are recorded in the summary. A failed
    /// discovery pass (every region failed, or the watermark store failed)
    /// fails the run, after the remaining families have still been processed.
    /// The first such error is returned.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let timer = Instant::now();
        let families = self.config.enabled_families();

        info!(run_id = %run_id, families = ?families, "Starting pipeline run");

        let runner = StageRunner::new(Arc::clone(&self.backend), run_id.clone())
            .with_color_ramp(self.color_ramp.clone());
        let dispatcher = StageDispatcher::new(
            Arc::new(runner),
            &self.config.paths.output_dir,
            &self.config.paths.scratch_dir,
        );

        let mut summaries = Vec::with_capacity(families.len());
        let mut outcome = Ok(());
        for family in families {
            match self.run_family(family, &dispatcher).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(run_id = %run_id, family = %family, error = %e, "Family failed");
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
        }

        metrics::RUN_DURATION
            .with_label_values(&[])
            .observe(timer.elapsed().as_secs_f64());
        let label = if outcome.is_ok() { "success" } else { "failed" };
        metrics::RUNS_TOTAL.with_label_values(&[label]).inc();
        outcome?;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            families: summaries,
        };
        info!(
            run_id = %summary.run_id,
            products_failed = summary.products_failed(),
            stages_failed = summary.stages_failed(),
            duration_secs = timer.elapsed().as_secs(),
            "Pipeline run finished"
        );
        Ok(summary)
    }

    async fn run_family(
        &self,
        family: SatelliteFamily,
        dispatcher: &StageDispatcher,
    ) -> Result<FamilySummary, PipelineError> {
        let family_config = self.config.family(family);
        let config_err = |reason: String| PipelineError::Config { family, reason };

        let regions = family_config
            .regions()
            .map_err(|e| config_err(e.to_string()))?;
        let specs: Vec<StageSpec> = family_config
            .stages_for(family)
            .map_err(config_err)?
            .into_iter()
            .map(|name| StageSpec::for_stage(name, family_config.scope, family_config.percentile))
            .collect();
        let options = DispatchOptions {
            scope: family_config.scope,
            web_mercator_copy: family_config.web_mercator_copy_for(family),
        };
        let params = SearchParams::from_family_config(family, family_config, Utc::now());

        let discovery = self.coordinator.discover(family, &regions, &params).await?;

        let mut summary = FamilySummary::new(family);
        summary.products_discovered = discovery.total_returned;
        summary.products_new = discovery.new_products.len();
        summary.region_failures = discovery.region_failures.clone();

        if discovery.new_products.is_empty() {
            info!(family = %family, "No new products");
            return Ok(summary);
        }

        let product_regions: HashMap<String, Vec<BoundingBox>> = discovery
            .new_products
            .iter()
            .map(|p| (p.id.clone(), discovery.regions_for(p)))
            .collect();
        let acquired = self.acquire_all(discovery.new_products).await;

        let mut ready = Vec::with_capacity(acquired.len());
        for (descriptor, result) in acquired {
            match result {
                Ok(product) => {
                    match product.origin {
                        AcquisitionOrigin::Cached => summary.products_cached += 1,
                        _ => summary.products_acquired += 1,
                    }
                    ready.push(product);
                }
                Err(e) => {
                    error!(family = %family, product_id = %descriptor.id, error = %e, "Acquisition failed");
                    summary.products_failed += 1;
                    summary.record(report(&descriptor, None, Some(e.to_string()), Vec::new()));
                }
            }
        }

        let max_parallel = self.config.runner.max_parallel_products.max(1);
        let specs = &specs;
        let product_regions = &product_regions;
        let dispatched: Vec<(AcquiredProduct, Result<Vec<StageResult>, DispatchError>)> =
            stream::iter(ready)
                .map(|product| async move {
                    let found_in = product_regions
                        .get(&product.descriptor.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let result = dispatcher
                        .run_in_regions(&product, specs, options, found_in)
                        .await;
                    (product, result)
                })
                .buffered(max_parallel)
                .collect()
                .await;

        for (product, result) in dispatched {
            let origin = Some(product.origin);
            match result {
                Ok(stages) => {
                    summary.record(report(&product.descriptor, origin, None, stages));
                }
                Err(e @ DispatchError::MissingManifest { .. }) => {
                    warn!(family = %family, product_id = %product.descriptor.id, error = %e, "Product skipped");
                    summary.products_skipped += 1;
                    summary.record(report(&product.descriptor, origin, Some(e.to_string()), Vec::new()));
                }
                Err(e) => {
                    error!(family = %family, product_id = %product.descriptor.id, error = %e, "Dispatch failed");
                    summary.products_failed += 1;
                    summary.record(report(&product.descriptor, origin, Some(e.to_string()), Vec::new()));
                }
            }
        }

        info!(
            family = %family,
            new = summary.products_new,
            acquired = summary.products_acquired,
            cached = summary.products_cached,
            failed = summary.products_failed,
            stages_computed = summary.stages_computed,
            stages_skipped = summary.stages_skipped,
            stages_failed = summary.stages_failed,
            "Family processed"
        );
        Ok(summary)
    }

    async fn acquire_all(
        &self,
        products: Vec<ProductDescriptor>,
    ) -> Vec<(ProductDescriptor, Result<AcquiredProduct, AcquisitionError>)> {
        let max_parallel = self.config.runner.max_parallel_acquisitions.max(1);
        let acquisition = &self.acquisition;
        stream::iter(products)
            .map(|descriptor| async move {
                let result = acquisition.acquire(&descriptor).await;
                (descriptor, result)
            })
            .buffered(max_parallel)
            .collect()
            .await
    }
}

fn report(
    descriptor: &ProductDescriptor,
    origin: Option<AcquisitionOrigin>,
    error: Option<String>,
    stages: Vec<StageResult>,
) -> ProductReport {
    ProductReport {
        product_id: descriptor.id.clone(),
        title: descriptor.title.clone(),
        origin,
        error,
        stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SharedToken;
    use crate::catalog::{BoundingBox, CatalogError};
    use crate::config::{FamilyConfig, PathsConfig};
    use crate::stage::StageName;
    use crate::testing::{
        fixtures, MemoryRasterBackend, MemoryWatermarkStore, MockArchiveExtractor,
        MockArchiveFetcher, MockCatalog, MockTokenProvider,
    };
    use tempfile::TempDir;

    const BOX: &str = "10,45,11,46";

    struct Harness {
        dir: TempDir,
        catalog: Arc<MockCatalog>,
        fetcher: Arc<MockArchiveFetcher>,
        backend: Arc<MemoryRasterBackend>,
        watermarks: Arc<MemoryWatermarkStore>,
        runner: PipelineRunner,
    }

    fn region() -> BoundingBox {
        BOX.parse().unwrap()
    }

    fn harness(s2: FamilyConfig) -> Harness {
        harness_with(FamilyConfig::default(), s2)
    }

    fn harness_with(s1: FamilyConfig, s2: FamilyConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = Config {
            paths: PathsConfig::rooted_at(dir.path()),
            ..Config::default()
        };
        config.s1 = s1;
        config.s2 = s2;

        let catalog = Arc::new(MockCatalog::new());
        let fetcher = Arc::new(MockArchiveFetcher::new());
        let backend = Arc::new(MemoryRasterBackend::new());
        let watermarks = Arc::new(MemoryWatermarkStore::new());
        let acquisition = AcquisitionManager::new(
            fetcher.clone(),
            Arc::new(MockArchiveExtractor::new()),
            Arc::new(SharedToken::new(Arc::new(MockTokenProvider::new()))),
            &config.paths.download_dir,
        );
        let runner = PipelineRunner::new(
            config,
            catalog.clone(),
            watermarks.clone(),
            acquisition,
            backend.clone(),
        );
        Harness {
            dir,
            catalog,
            fetcher,
            backend,
            watermarks,
            runner,
        }
    }

    async fn register(h: &Harness, product: &ProductDescriptor) {
        let manifest = h
            .dir
            .path()
            .join("download")
            .join(&product.title)
            .join(product.manifest_file_name());
        h.backend.add_s2_product(&manifest, 10, 10).await;
    }

    #[tokio::test]
    async fn test_no_enabled_family_is_empty_run() {
        let h = harness(FamilyConfig::default());

        let summary = h.runner.run().await.unwrap();

        assert!(summary.families.is_empty());
        assert!(h.catalog.recorded_queries().await.is_empty());
        assert!(Uuid::parse_str(&summary.run_id).is_ok());
    }

    #[tokio::test]
    async fn test_products_flow_through_stages() {
        let h = harness(
            FamilyConfig::enabled_with_boxes(&[BOX])
                .with_stages(&[StageName::TrueColor, StageName::VegetationIndex]),
        );
        let product = fixtures::s2_product("uuid-1", region());
        register(&h, &product).await;
        h.catalog.set_region_results(region(), vec![product]).await;

        let summary = h.runner.run().await.unwrap();

        let s2 = summary.family(SatelliteFamily::S2).unwrap();
        assert_eq!(s2.products_new, 1);
        assert_eq!(s2.products_acquired, 1);
        assert_eq!(s2.stages_computed, 2);
        assert_eq!(s2.stages_failed, 0);
        assert!(h
            .dir
            .path()
            .join("output/s2/tci/T32TQM-20240614T101031Z-TCI.tif")
            .exists());
    }

    #[tokio::test]
    async fn test_acquisition_failure_isolated() {
        let h = harness(
            FamilyConfig::enabled_with_boxes(&[BOX]).with_stages(&[StageName::TrueColor]),
        );
        let products = fixtures::s2_products(&["uuid-1", "uuid-2"], region());
        for p in &products {
            register(&h, p).await;
        }
        h.catalog.set_region_results(region(), products).await;
        h.fetcher
            .set_next_error(crate::acquisition::FetchError::Status {
                status: 404,
                body: "gone".into(),
            })
            .await;

        let summary = h.runner.run().await.unwrap();

        let s2 = summary.family(SatelliteFamily::S2).unwrap();
        assert_eq!(s2.products_failed, 1);
        assert_eq!(s2.products_acquired, 1);
        assert_eq!(s2.stages_computed, 1);
        assert!(s2.products[0].error.is_some());
    }

    #[tokio::test]
    async fn test_total_search_failure_is_fatal() {
        let h = harness(FamilyConfig::enabled_with_boxes(&[BOX]));
        h.catalog
            .fail_region(region(), CatalogError::Status { status: 503, body: "down".into() })
            .await;

        let err = h.runner.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Search(_)));
        assert_eq!(h.watermarks.commit_count().await, 0);
        assert_eq!(h.fetcher.download_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_family_does_not_block_the_other() {
        let s1_box: BoundingBox = "12,44,13,45".parse().unwrap();
        let h = harness_with(
            FamilyConfig::enabled_with_boxes(&["12,44,13,45"]),
            FamilyConfig::enabled_with_boxes(&[BOX]).with_stages(&[StageName::TrueColor]),
        );
        h.catalog
            .fail_region(s1_box, CatalogError::Status { status: 503, body: "down".into() })
            .await;
        let product = fixtures::s2_product("uuid-1", region());
        register(&h, &product).await;
        h.catalog.set_region_results(region(), vec![product]).await;

        let err = h.runner.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Search(_)));
        assert!(h.watermarks.get(SatelliteFamily::S1).await.is_none());
        let s2 = h.watermarks.get(SatelliteFamily::S2).await.unwrap();
        assert!(s2.has_seen("uuid-1"));
        assert_eq!(h.fetcher.download_count().await, 1);
        assert!(h
            .dir
            .path()
            .join("output/s2/tci/T32TQM-20240614T101031Z-TCI.tif")
            .exists());
    }

    #[tokio::test]
    async fn test_unparseable_boxes_are_config_error() {
        let mut family = FamilyConfig::enabled_with_boxes(&[BOX]);
        family.boxes = crate::config::BoxList::Raw("not a box".into());
        let h = harness(family);

        let err = h.runner.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config {
                family: SatelliteFamily::S2,
                ..
            }
        ));
    }
}
