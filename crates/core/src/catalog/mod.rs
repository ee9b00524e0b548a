//! Product catalog: query the remote archive for products over a region.

mod copernicus;
mod title;
mod types;

pub use copernicus::CopernicusCatalog;
pub use title::{parse_s1_title, parse_s2_title, S1Title, S2Title};
pub use types::{
    parse_boxes, BoundingBox, CatalogError, CatalogQuery, ProductDescriptor, SatelliteFamily,
};

use async_trait::async_trait;

/// A remote catalogue of satellite products.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Name of this catalogue (for logging).
    fn name(&self) -> &str;

    /// Fetch one page of products matching the query.
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<ProductDescriptor>, CatalogError>;
}
