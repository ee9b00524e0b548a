//! Pipeline runner configuration.

use serde::{Deserialize, Serialize};

/// Parallelism and scheduling for pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Regions searched concurrently within one discovery pass.
    #[serde(default = "default_parallel_regions")]
    pub max_parallel_regions: usize,

    /// Products downloaded/extracted concurrently.
    /// Token refresh stays serialized regardless of this value.
    #[serde(default = "default_parallel")]
    pub max_parallel_acquisitions: usize,

    /// Products whose stages run concurrently.
    #[serde(default = "default_parallel")]
    pub max_parallel_products: usize,

    /// Seconds between scheduled runs. Absent means run once and exit.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

fn default_parallel_regions() -> usize {
    4
}

fn default_parallel() -> usize {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel_regions: default_parallel_regions(),
            max_parallel_acquisitions: default_parallel(),
            max_parallel_products: default_parallel(),
            interval_secs: None,
        }
    }
}

impl RunnerConfig {
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    pub fn with_parallelism(mut self, acquisitions: usize, products: usize) -> Self {
        self.max_parallel_acquisitions = acquisitions;
        self.max_parallel_products = products;
        self
    }
}
