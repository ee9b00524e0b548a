//! Deduplication of descriptors returned under several regions.

use std::collections::{HashMap, HashSet};

use crate::catalog::{BoundingBox, ProductDescriptor};

/// Drop descriptors whose id was already seen, keeping the first occurrence
/// and the original order.
pub fn deduplicate_products(products: Vec<ProductDescriptor>) -> Vec<ProductDescriptor> {
    let mut seen: HashSet<String> = HashSet::with_capacity(products.len());
    products
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

/// Every distinct region each product id was returned under, in search order.
pub fn regions_by_product(products: &[ProductDescriptor]) -> HashMap<String, Vec<BoundingBox>> {
    let mut regions: HashMap<String, Vec<BoundingBox>> = HashMap::new();
    for p in products {
        let entry = regions.entry(p.id.clone()).or_default();
        if !entry.contains(&p.region) {
            entry.push(p.region);
        }
    }
    regions
}
