//! Incremental discovery across regions with a committed watermark.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::catalog::{
    BoundingBox, CatalogClient, CatalogError, CatalogQuery, ProductDescriptor, SatelliteFamily,
};
use crate::metrics;
use crate::watermark::{Watermark, WatermarkStore};

use super::dedup::{deduplicate_products, regions_by_product};
use super::{Discovery, RegionFailure, SearchError, SearchParams};

/// Runs discovery passes: one catalogue search per region, dedup against the
/// previous watermark, then a single watermark commit.
pub struct SearchCoordinator {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn WatermarkStore>,
    max_parallel_regions: usize,
}

impl SearchCoordinator {
    pub fn new(catalog: Arc<dyn CatalogClient>, store: Arc<dyn WatermarkStore>) -> Self {
        Self {
            catalog,
            store,
            max_parallel_regions: 4,
        }
    }

    pub fn with_max_parallel_regions(mut self, n: usize) -> Self {
        self.max_parallel_regions = n.max(1);
        self
    }

    /// Discover products published since the family's watermark.
    ///
    /// Per-region failures are logged and reported in the result. The
    /// watermark is committed unless every region failed.
    pub async fn discover(
        &self,
        family: SatelliteFamily,
        regions: &[BoundingBox],
        params: &SearchParams,
    ) -> Result<Discovery, SearchError> {
        if regions.is_empty() {
            return Err(SearchError::NoRegions(family));
        }

        let previous = self.store.load(family).await?;
        let start = previous
            .as_ref()
            .map(|w| w.last_run)
            .unwrap_or(params.default_start);
        let pass_started = Utc::now();

        info!(
            family = %family,
            regions = regions.len(),
            start = %start,
            catalog = self.catalog.name(),
            "Starting discovery"
        );

        let mut results: Vec<(usize, BoundingBox, Result<Vec<ProductDescriptor>, CatalogError>)> =
            stream::iter(regions.iter().copied().enumerate())
                .map(|(idx, region)| async move {
                    let result = self.search_region(family, region, start, params).await;
                    (idx, region, result)
                })
                .buffer_unordered(self.max_parallel_regions)
                .collect()
                .await;
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut returned: Vec<ProductDescriptor> = Vec::new();
        let mut failures: Vec<RegionFailure> = Vec::new();
        for (_, region, result) in results {
            match result {
                Ok(mut products) => {
                    debug!(family = %family, region = %region, count = products.len(), "Region searched");
                    returned.append(&mut products);
                }
                Err(e) => {
                    warn!(family = %family, region = %region, error = %e, "Region search failed");
                    metrics::REGION_SEARCH_FAILURES
                        .with_label_values(&[family.as_str()])
                        .inc();
                    failures.push(RegionFailure {
                        region,
                        error: e.to_string(),
                    });
                }
            }
        }

        if failures.len() == regions.len() {
            return Err(SearchError::AllRegionsFailed { family, failures });
        }

        let product_regions = regions_by_product(&returned);
        let returned = deduplicate_products(returned);
        let new_products: Vec<ProductDescriptor> = returned
            .iter()
            .filter(|p| !previous.as_ref().is_some_and(|w| w.has_seen(&p.id)))
            .cloned()
            .collect();

        let watermark = Watermark::new(
            family,
            pass_started,
            returned.iter().map(|p| p.id.clone()),
        );
        self.store.commit(&watermark).await?;

        metrics::PRODUCTS_DISCOVERED
            .with_label_values(&[family.as_str()])
            .inc_by(returned.len() as u64);
        metrics::PRODUCTS_NEW
            .with_label_values(&[family.as_str()])
            .inc_by(new_products.len() as u64);

        info!(
            family = %family,
            returned = returned.len(),
            new = new_products.len(),
            failed_regions = failures.len(),
            "Discovery complete"
        );

        Ok(Discovery {
            family,
            new_products,
            watermark,
            total_returned: returned.len(),
            region_failures: failures,
            product_regions,
        })
    }

    /// Fetch pages for one region until a short page or the page limit.
    async fn search_region(
        &self,
        family: SatelliteFamily,
        region: BoundingBox,
        start: DateTime<Utc>,
        params: &SearchParams,
    ) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let mut products = Vec::new();
        for page in 1..=params.max_pages.max(1) {
            let query = CatalogQuery {
                family,
                region,
                product_type: params.product_type.clone(),
                start,
                max_cloud_cover: params.max_cloud_cover,
                max_records: params.max_records,
                page,
                sort_param: params.sort_param.clone(),
                sort_order: params.sort_order.clone(),
            };
            let batch = self.catalog.search(&query).await?;
            let short_page = (batch.len() as u32) < params.max_records;
            products.extend(batch);
            if short_page {
                break;
            }
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MemoryWatermarkStore, MockCatalog};
    use chrono::{Duration, TimeZone};

    fn params() -> SearchParams {
        SearchParams {
            product_type: "L2A".to_string(),
            max_cloud_cover: Some(5.0),
            max_records: 5,
            max_pages: 1,
            sort_param: "startDate".to_string(),
            sort_order: "descending".to_string(),
            default_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn region_a() -> BoundingBox {
        BoundingBox::new(10.0, 45.0, 11.0, 46.0).unwrap()
    }

    fn region_b() -> BoundingBox {
        BoundingBox::new(12.0, 44.0, 13.0, 45.0).unwrap()
    }

    #[tokio::test]
    async fn test_first_pass_everything_new() {
        let catalog = Arc::new(MockCatalog::new());
        catalog
            .set_region_results(region_a(), fixtures::s2_products(&["a", "b", "c"], region_a()))
            .await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog.clone(), store.clone());

        let discovery = coordinator
            .discover(SatelliteFamily::S2, &[region_a()], &params())
            .await
            .unwrap();

        assert_eq!(discovery.new_products.len(), 3);
        let committed = store.get(SatelliteFamily::S2).await.unwrap();
        assert_eq!(committed.seen_ids.len(), 3);

        let queries = catalog.recorded_queries().await;
        assert_eq!(queries[0].start, params().default_start);
        assert_eq!(queries[0].max_cloud_cover, Some(5.0));
    }

    #[tokio::test]
    async fn test_second_pass_uses_watermark() {
        let catalog = Arc::new(MockCatalog::new());
        catalog
            .set_region_results(region_a(), fixtures::s2_products(&["a", "b"], region_a()))
            .await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let last_run = Utc::now() - Duration::hours(6);
        store
            .put(Watermark::new(
                SatelliteFamily::S2,
                last_run,
                vec!["a".to_string()],
            ))
            .await;
        let coordinator = SearchCoordinator::new(catalog.clone(), store.clone());

        let discovery = coordinator
            .discover(SatelliteFamily::S2, &[region_a()], &params())
            .await
            .unwrap();

        let ids: Vec<_> = discovery.new_products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(
            catalog.recorded_queries().await[0].start.timestamp(),
            last_run.timestamp()
        );
        // Full returned set replaces the previous ids.
        let committed = store.get(SatelliteFamily::S2).await.unwrap();
        assert!(committed.has_seen("a") && committed.has_seen("b"));
        assert!(committed.last_run > last_run);
    }

    #[tokio::test]
    async fn test_zero_new_still_commits() {
        let catalog = Arc::new(MockCatalog::new());
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog, store.clone());

        let discovery = coordinator
            .discover(SatelliteFamily::S1, &[region_a()], &params())
            .await
            .unwrap();

        assert!(discovery.new_products.is_empty());
        assert_eq!(store.commit_count().await, 1);
    }

    #[tokio::test]
    async fn test_cross_region_duplicates_merged() {
        let catalog = Arc::new(MockCatalog::new());
        catalog
            .set_region_results(region_a(), fixtures::s2_products(&["a", "shared"], region_a()))
            .await;
        catalog
            .set_region_results(region_b(), fixtures::s2_products(&["shared", "z"], region_b()))
            .await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog, store);

        let discovery = coordinator
            .discover(SatelliteFamily::S2, &[region_a(), region_b()], &params())
            .await
            .unwrap();

        let ids: Vec<_> = discovery.new_products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "shared", "z"]);
        assert_eq!(discovery.total_returned, 3);
        assert_eq!(discovery.new_products[1].region, region_a());
        assert_eq!(
            discovery.regions_for(&discovery.new_products[1]),
            vec![region_a(), region_b()]
        );
        assert_eq!(discovery.regions_for(&discovery.new_products[2]), vec![region_b()]);
    }

    #[tokio::test]
    async fn test_partial_failure_isolated() {
        let catalog = Arc::new(MockCatalog::new());
        catalog
            .fail_region(region_a(), CatalogError::Status { status: 503, body: "down".into() })
            .await;
        catalog
            .set_region_results(region_b(), fixtures::s2_products(&["z"], region_b()))
            .await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog, store.clone());

        let discovery = coordinator
            .discover(SatelliteFamily::S2, &[region_a(), region_b()], &params())
            .await
            .unwrap();

        assert_eq!(discovery.new_products.len(), 1);
        assert_eq!(discovery.region_failures.len(), 1);
        assert_eq!(discovery.region_failures[0].region, region_a());
        let committed = store.get(SatelliteFamily::S2).await.unwrap();
        assert_eq!(committed.seen_ids.len(), 1);
        assert!(committed.has_seen("z"));
    }

    #[tokio::test]
    async fn test_total_failure_leaves_watermark() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.fail_region(region_a(), CatalogError::Timeout).await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog, store.clone());

        let err = coordinator
            .discover(SatelliteFamily::S2, &[region_a()], &params())
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::AllRegionsFailed { .. }));
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_regions() {
        let coordinator = SearchCoordinator::new(
            Arc::new(MockCatalog::new()),
            Arc::new(MemoryWatermarkStore::new()),
        );
        let err = coordinator
            .discover(SatelliteFamily::S1, &[], &params())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoRegions(SatelliteFamily::S1)));
    }

    #[tokio::test]
    async fn test_paging_stops_on_short_page() {
        let catalog = Arc::new(MockCatalog::new());
        let ids: Vec<String> = (0..7).map(|i| format!("p{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        catalog
            .set_region_results(region_a(), fixtures::s2_products(&id_refs, region_a()))
            .await;
        let store = Arc::new(MemoryWatermarkStore::new());
        let coordinator = SearchCoordinator::new(catalog.clone(), store);

        let mut p = params();
        p.max_pages = 5;
        let discovery = coordinator
            .discover(SatelliteFamily::S2, &[region_a()], &p)
            .await
            .unwrap();

        assert_eq!(discovery.new_products.len(), 7);
        let pages: Vec<u32> = catalog.recorded_queries().await.iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_watermark_commit_failure_is_error() {
        let catalog = Arc::new(MockCatalog::new());
        let store = Arc::new(MemoryWatermarkStore::new());
        store.fail_commits(true).await;
        let coordinator = SearchCoordinator::new(catalog, store);

        let err = coordinator
            .discover(SatelliteFamily::S2, &[region_a()], &params())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Watermark(_)));
    }
}
