//! Per-product stage dispatch and output naming.

#[allow(clippy::module_inception)]
mod dispatcher;
mod naming;
mod types;

pub use dispatcher::StageDispatcher;
pub use naming::{canonical_name, canonical_name_in, output_path};
pub use types::*;
