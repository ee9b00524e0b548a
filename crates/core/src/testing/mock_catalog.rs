//! Mock catalogue client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{BoundingBox, CatalogClient, CatalogError, CatalogQuery, ProductDescriptor};

/// Mock implementation of the CatalogClient trait.
///
/// Results are configured per region and served in pages of
/// `query.max_records`, so pagination behaves like the real catalogue.
///
/// # Example
///
/// ```rust,ignore
/// use sentinel_core::testing::{MockCatalog, fixtures};
///
/// let catalog = MockCatalog::new();
/// let region = "10,45,11,46".parse()?;
/// catalog.set_region_results(region, fixtures::s2_products(&["a", "b"], region)).await;
/// catalog.fail_region(other, CatalogError::Timeout).await;
/// ```
#[derive(Debug, Default)]
pub struct MockCatalog {
    /// Products per region, keyed by the region's query string.
    results: Arc<RwLock<HashMap<String, Vec<ProductDescriptor>>>>,
    /// Regions whose searches fail.
    failures: Arc<RwLock<HashMap<String, CatalogError>>>,
    /// Every query received, failed ones included.
    queries: Arc<RwLock<Vec<CatalogQuery>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Products returned for `region`, across all pages.
    pub async fn set_region_results(&self, region: BoundingBox, products: Vec<ProductDescriptor>) {
        self.results
            .write()
            .await
            .insert(region.to_query_string(), products);
    }

    /// Make every search for `region` fail with `error`.
    pub async fn fail_region(&self, region: BoundingBox, error: CatalogError) {
        self.failures
            .write()
            .await
            .insert(region.to_query_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Delay every search response.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn recorded_queries(&self) -> Vec<CatalogQuery> {
        self.queries.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.queries.read().await.len()
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &CatalogQuery) -> Result<Vec<ProductDescriptor>, CatalogError> {
        self.queries.write().await.push(query.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let key = query.region.to_query_string();
        if let Some(err) = self.failures.read().await.get(&key) {
            return Err(err.clone());
        }

        let results = self.results.read().await;
        let products = results.get(&key).map(Vec::as_slice).unwrap_or_default();
        let page_size = query.max_records.max(1) as usize;
        let skip = query.page.saturating_sub(1) as usize * page_size;
        Ok(products
            .iter()
            .filter(|p| p.family == query.family)
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect())
    }
}
