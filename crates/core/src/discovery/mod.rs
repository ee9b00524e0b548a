//! Discovery of newly published products.

mod coordinator;
mod dedup;
mod types;

pub use coordinator::SearchCoordinator;
pub use dedup::{deduplicate_products, regions_by_product};
pub use types::*;
