//! Pipeline runs and their scheduling.
//!
//! A run walks every enabled family through discovery, acquisition and stage
//! dispatch. The scheduler guarantees at most one run in flight per process.

mod config;
mod runner;
mod scheduler;
mod types;

pub use config::RunnerConfig;
pub use runner::PipelineRunner;
pub use scheduler::{LastError, PipelineScheduler, SchedulerStatus};
pub use types::{FamilySummary, PipelineError, ProductReport, RunSummary};
