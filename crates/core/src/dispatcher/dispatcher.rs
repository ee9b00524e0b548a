//! Fan one acquired product out into its enabled stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::acquisition::AcquiredProduct;
use crate::catalog::BoundingBox;
use crate::metrics;
use crate::stage::{ScratchArea, StageRequest, StageRunner, StageScope, StageSpec};

use super::naming::{canonical_name_in, output_path, scratch_key};
use super::{DispatchError, DispatchOptions, StageResult};

/// Runs stages for acquired products under one run id.
pub struct StageDispatcher {
    runner: Arc<StageRunner>,
    output_dir: PathBuf,
    scratch_root: PathBuf,
}

impl StageDispatcher {
    pub fn new(
        runner: Arc<StageRunner>,
        output_dir: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            output_dir: output_dir.into(),
            scratch_root: scratch_root.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run `stages` in order for `product`.
    ///
    /// A failing stage is recorded and the remaining stages still run. The
    /// product's scratch area is removed afterwards.
    pub async fn run(
        &self,
        product: &AcquiredProduct,
        stages: &[StageSpec],
        options: DispatchOptions,
    ) -> Result<Vec<StageResult>, DispatchError> {
        self.run_in_regions(product, stages, options, &[product.descriptor.region])
            .await
    }

    /// Like [`run`](Self::run), but in box scope cuts `product` once for every
    /// region in `regions`, each under its own output name.
    ///
    /// Tile scope makes a single pass whatever `regions` holds. All passes
    /// share one scratch area.
    pub async fn run_in_regions(
        &self,
        product: &AcquiredProduct,
        stages: &[StageSpec],
        options: DispatchOptions,
        regions: &[BoundingBox],
    ) -> Result<Vec<StageResult>, DispatchError> {
        let descriptor = &product.descriptor;

        if !tokio::fs::try_exists(&product.manifest_path).await? {
            return Err(DispatchError::MissingManifest {
                product_id: descriptor.id.clone(),
                path: product.manifest_path.clone(),
            });
        }

        let passes: Vec<Option<BoundingBox>> = match options.scope {
            StageScope::Tile => vec![None],
            StageScope::Box if regions.is_empty() => vec![Some(descriptor.region)],
            StageScope::Box => regions.iter().copied().map(Some).collect(),
        };
        let names = passes
            .iter()
            .map(|region| {
                canonical_name_in(
                    descriptor,
                    options.scope,
                    region.unwrap_or(descriptor.region),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scratch = ScratchArea::new(
            &self.scratch_root,
            self.runner.run_id(),
            &scratch_key(&descriptor.id),
        );

        let mut results = Vec::with_capacity(stages.len() * passes.len());
        for (region, name) in passes.into_iter().zip(&names) {
            debug!(product_id = %descriptor.id, name = %name, stages = stages.len(), "Dispatching stages");

            for spec in stages {
                let path = output_path(&self.output_dir, descriptor.family, spec.name, name);
                let request = StageRequest {
                    product,
                    spec,
                    output_path: &path,
                    region,
                    web_mercator_copy: options.web_mercator_copy,
                };

                let result = match self.runner.compute(&request, &scratch).await {
                    Ok(outcome) => StageResult::from_outcome(outcome),
                    Err(e) => {
                        error!(product_id = %descriptor.id, name = %name, stage = %spec.name, error = %e, "Stage failed");
                        StageResult::failed(spec.name, e)
                    }
                };
                metrics::STAGES_TOTAL
                    .with_label_values(&[spec.name.as_str(), result.outcome_label()])
                    .inc();
                results.push(result);
            }
        }

        scratch.cleanup().await;

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(
            product_id = %descriptor.id,
            names = ?names,
            stages = results.len(),
            failed,
            "Product dispatched"
        );
        Ok(results)
    }
}
