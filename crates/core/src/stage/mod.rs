//! Derived-product stages: the static catalogue, shared scratch inputs and
//! the idempotent compute runner.

mod runner;
mod scratch;
mod specs;
mod types;

pub use runner::{partial_path, web_mercator_path, StageRequest, StageRunner};
pub use scratch::ScratchArea;
pub use specs::{DerivedBand, StageAlgorithm, StageSpec};
pub use types::*;
