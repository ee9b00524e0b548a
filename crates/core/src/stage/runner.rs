//! Skip-if-exists, read, render, write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::acquisition::AcquiredProduct;
use crate::catalog::BoundingBox;
use crate::metrics;
use crate::raster::normalize::{
    band_difference, band_product, band_ratio, fixed_range_stretch, minmax_stretch,
    normalized_difference, percentile_stretch, validity_mask, NODATA,
};
use crate::raster::projection::WEB_MERCATOR;
use crate::raster::{
    compute_window, Band, ByteBand, ColorRamp, DatasetInfo, PixelWindow, RasterBackend,
    RasterError, RasterImage, RasterProfile, SubdatasetRef,
};

use super::specs::{DerivedBand, StageAlgorithm};
use super::{
    NormalizationKind, OutputArtifact, ScratchArea, StageComputeError, StageName, StageOutcome,
    StageSpec,
};

/// One stage invocation for one product.
#[derive(Debug, Clone)]
pub struct StageRequest<'a> {
    pub product: &'a AcquiredProduct,
    pub spec: &'a StageSpec,
    pub output_path: &'a Path,
    /// Restrict reads to this region; `None` reads the whole dataset.
    pub region: Option<BoundingBox>,
    /// Also write `<stem>-3857.tif` after a fresh computation.
    pub web_mercator_copy: bool,
}

/// Bands read for a stage plus the geometry they came from.
struct StageInputs {
    bands: Vec<Band>,
    profile: RasterProfile,
}

/// Rendered output ready for the backend.
enum Rendered {
    Image(RasterImage),
    Ramp {
        band: Band,
        mask: ByteBand,
        profile: RasterProfile,
    },
}

/// Executes derived-product stages through a raster backend.
pub struct StageRunner {
    backend: Arc<dyn RasterBackend>,
    ramp: ColorRamp,
    run_id: String,
}

impl StageRunner {
    pub fn new(backend: Arc<dyn RasterBackend>, run_id: impl Into<String>) -> Self {
        Self {
            backend,
            ramp: ColorRamp::default(),
            run_id: run_id.into(),
        }
    }

    pub fn with_color_ramp(mut self, ramp: ColorRamp) -> Self {
        self.ramp = ramp;
        self
    }

    pub fn backend(&self) -> &dyn RasterBackend {
        self.backend.as_ref()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Compute one stage unless its output already exists.
    ///
    /// The existence check happens before any source data is opened. New
    /// output is written under a temporary name and renamed into place.
    pub async fn compute(
        &self,
        request: &StageRequest<'_>,
        scratch: &ScratchArea,
    ) -> Result<StageOutcome, StageComputeError> {
        let spec = request.spec;
        let stage = spec.name;
        let product_id = request.product.descriptor.id.clone();
        let artifact = OutputArtifact {
            path: request.output_path.to_path_buf(),
            stage,
            product_id: product_id.clone(),
        };

        let exists = tokio::fs::try_exists(request.output_path)
            .await
            .map_err(|source| StageComputeError::Io { stage, source })?;
        if exists {
            debug!(product_id = %product_id, stage = %stage, path = %request.output_path.display(), "Output exists, skipping");
            return Ok(StageOutcome::Skipped(artifact));
        }

        let family = request.product.descriptor.family;
        if stage.family() != family {
            return Err(StageComputeError::WrongFamily { stage, family });
        }

        let started = Instant::now();
        let inputs = self.read_inputs(request, scratch).await?;
        let rendered = self.render(spec, &product_id, inputs)?;
        self.write(stage, &rendered, request.output_path).await?;

        metrics::STAGE_DURATION
            .with_label_values(&[stage.as_str()])
            .observe(started.elapsed().as_secs_f64());
        info!(product_id = %product_id, stage = %stage, path = %request.output_path.display(), "Stage computed");

        if request.web_mercator_copy {
            if let Err(e) = self.web_mercator_copy(stage, request.output_path).await {
                warn!(product_id = %product_id, stage = %stage, error = %e, "Web mercator copy failed");
            }
        }

        Ok(StageOutcome::Computed(artifact))
    }

    async fn open_input(
        &self,
        input: SubdatasetRef,
        request: &StageRequest<'_>,
        scratch: &ScratchArea,
    ) -> Result<DatasetInfo, RasterError> {
        let manifest = &request.product.manifest_path;
        match input {
            SubdatasetRef::Amplitude(pol) => scratch
                .amplitude(pol, self.backend.as_ref(), manifest)
                .await
                .cloned(),
            SubdatasetRef::Index(_) => self.backend.open_subdataset(manifest, input).await,
        }
    }

    async fn read_inputs(
        &self,
        request: &StageRequest<'_>,
        scratch: &ScratchArea,
    ) -> Result<StageInputs, StageComputeError> {
        let spec = request.spec;
        let read_err = |source: RasterError| StageComputeError::Read {
            stage: spec.name,
            product_id: request.product.descriptor.id.clone(),
            source,
        };

        let mut bands = Vec::with_capacity(spec.inputs.len() * spec.band_indices.len());
        let mut profile: Option<RasterProfile> = None;

        for &input in &spec.inputs {
            let dataset = self
                .open_input(input, request, scratch)
                .await
                .map_err(read_err)?;

            let window: PixelWindow = match &request.region {
                Some(region) => compute_window(region, &dataset).map_err(read_err)?,
                None => dataset.full_window(),
            };
            if window.is_empty() {
                return Err(read_err(RasterError::EmptyWindow));
            }

            let mut read = self
                .backend
                .read_window(&dataset, &spec.band_indices, Some(&window))
                .await
                .map_err(read_err)?;
            if read.len() != spec.band_indices.len() {
                return Err(StageComputeError::ShapeMismatch {
                    stage: spec.name,
                    product_id: request.product.descriptor.id.clone(),
                    detail: format!(
                        "expected {} bands from {}, got {}",
                        spec.band_indices.len(),
                        dataset.source,
                        read.len()
                    ),
                });
            }
            bands.append(&mut read);
            profile.get_or_insert_with(|| RasterProfile::for_window(&dataset, &window));
        }

        let profile = profile.ok_or_else(|| StageComputeError::ShapeMismatch {
            stage: spec.name,
            product_id: request.product.descriptor.id.clone(),
            detail: "stage has no inputs".to_string(),
        })?;

        let expected = (profile.width, profile.height);
        if let Some(band) = bands.iter().find(|b| b.shape() != expected) {
            return Err(StageComputeError::ShapeMismatch {
                stage: spec.name,
                product_id: request.product.descriptor.id.clone(),
                detail: format!("band {:?} vs window {:?}", band.shape(), expected),
            });
        }

        Ok(StageInputs { bands, profile })
    }

    fn render(
        &self,
        spec: &StageSpec,
        product_id: &str,
        inputs: StageInputs,
    ) -> Result<Rendered, StageComputeError> {
        let StageInputs { bands, profile } = inputs;
        let mismatch = |e: RasterError| StageComputeError::ShapeMismatch {
            stage: spec.name,
            product_id: product_id.to_string(),
            detail: e.to_string(),
        };
        let stretch = |band: &Band| match spec.normalization {
            NormalizationKind::MinMax => minmax_stretch(band),
            NormalizationKind::FixedRange => fixed_range_stretch(band),
            NormalizationKind::Percentile | NormalizationKind::ColorRamp => {
                percentile_stretch(band, spec.percentile)
            }
        };
        let pair = || match bands.as_slice() {
            [a, b] => Ok((a, b)),
            other => Err(StageComputeError::ShapeMismatch {
                stage: spec.name,
                product_id: product_id.to_string(),
                detail: format!("expected 2 bands, got {}", other.len()),
            }),
        };

        let mask = match bands.first() {
            Some(primary) => validity_mask(primary, NODATA),
            None => return Err(mismatch(RasterError::EmptyWindow)),
        };

        let channels: Vec<ByteBand> = match spec.algorithm {
            StageAlgorithm::Composite => bands.iter().map(stretch).collect(),
            StageAlgorithm::NormalizedDifference => {
                let (nir, red) = pair()?;
                let index = normalized_difference(nir, red).map_err(mismatch)?;
                if spec.normalization == NormalizationKind::ColorRamp {
                    return Ok(Rendered::Ramp {
                        band: index,
                        mask,
                        profile,
                    });
                }
                vec![stretch(&index)]
            }
            StageAlgorithm::DualPolarization(derived) => {
                let (vv, vh) = pair()?;
                let derived = match derived {
                    DerivedBand::Ratio => band_ratio(vv, vh),
                    DerivedBand::RatioInverse => band_ratio(vh, vv),
                    DerivedBand::Product => band_product(vv, vh),
                    DerivedBand::Difference => band_difference(vv, vh),
                }
                .map_err(mismatch)?;
                vec![stretch(vv), stretch(vh), stretch(&derived)]
            }
        };

        if channels.len() != spec.output_channels {
            return Err(StageComputeError::ShapeMismatch {
                stage: spec.name,
                product_id: product_id.to_string(),
                detail: format!(
                    "rendered {} channels, stage declares {}",
                    channels.len(),
                    spec.output_channels
                ),
            });
        }

        Ok(Rendered::Image(RasterImage {
            bands: channels,
            mask: Some(mask),
            profile,
        }))
    }

    /// Write to `.<name>.<run id>.partial.tif` next to `output`, then rename.
    async fn write(
        &self,
        stage: StageName,
        rendered: &Rendered,
        output: &Path,
    ) -> Result<(), StageComputeError> {
        let write_err = |source: RasterError| StageComputeError::Write {
            stage,
            path: output.to_path_buf(),
            source,
        };
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StageComputeError::Io { stage, source })?;
        }

        let partial = partial_path(output, &self.run_id);
        let result = match rendered {
            Rendered::Image(image) => self.backend.write_image(image, &partial).await,
            Rendered::Ramp {
                band,
                mask,
                profile,
            } => match self
                .backend
                .apply_color_ramp(band, profile, &self.ramp, &partial)
                .await
            {
                Ok(()) => self.backend.write_mask(&partial, mask).await,
                Err(e) => Err(e),
            },
        };

        let result = match result {
            Ok(()) => tokio::fs::rename(&partial, output)
                .await
                .map_err(RasterError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result.map_err(write_err)
    }

    async fn web_mercator_copy(&self, stage: StageName, output: &Path) -> Result<(), RasterError> {
        let dest = web_mercator_path(output);
        let partial = partial_path(&dest, &self.run_id);
        let dataset = self.backend.open(output).await?;
        let result = match self
            .backend
            .reproject(&dataset, WEB_MERCATOR, &partial, true)
            .await
        {
            Ok(_) => tokio::fs::rename(&partial, &dest)
                .await
                .map_err(RasterError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        } else {
            debug!(stage = %stage, path = %dest.display(), "Web mercator copy written");
        }
        result
    }
}

/// Hidden in-progress name in the same directory as `output`.
pub fn partial_path(output: &Path, run_id: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.{}.partial.tif", stem, run_id))
}

/// `<stem>-3857.tif` next to `output`.
pub fn web_mercator_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{}-{}.tif", stem, WEB_MERCATOR))
}
