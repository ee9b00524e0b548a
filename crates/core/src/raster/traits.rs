//! Raster backend trait.

use async_trait::async_trait;
use std::path::Path;

use super::{
    Band, ByteBand, ColorRamp, DatasetInfo, PixelWindow, RasterError, RasterImage, RasterProfile,
    SubdatasetRef,
};

/// Raster I/O, reprojection and rendering.
///
/// Stages never touch raster files directly; every read and write goes
/// through this trait.
#[async_trait]
pub trait RasterBackend: Send + Sync {
    /// Name of this backend (for logging).
    fn name(&self) -> &str;

    /// Open a subdataset of the product described by `manifest`.
    async fn open_subdataset(
        &self,
        manifest: &Path,
        subdataset: SubdatasetRef,
    ) -> Result<DatasetInfo, RasterError>;

    /// Open a plain raster file.
    async fn open(&self, path: &Path) -> Result<DatasetInfo, RasterError>;

    /// Read 1-based `bands` as float samples, restricted to `window` if given.
    async fn read_window(
        &self,
        dataset: &DatasetInfo,
        bands: &[usize],
        window: Option<&PixelWindow>,
    ) -> Result<Vec<Band>, RasterError>;

    /// Write a compressed byte image (with its validity mask, if any) to `path`.
    async fn write_image(&self, image: &RasterImage, path: &Path) -> Result<(), RasterError>;

    /// Attach a validity mask to the image already at `path`.
    async fn write_mask(&self, path: &Path, mask: &ByteBand) -> Result<(), RasterError>;

    /// Warp `source` into `dst_epsg`, writing `dest`, optionally with an alpha band.
    async fn reproject(
        &self,
        source: &DatasetInfo,
        dst_epsg: u32,
        dest: &Path,
        add_alpha: bool,
    ) -> Result<DatasetInfo, RasterError>;

    /// Render a float band through a color ramp into an RGB image at `path`.
    async fn apply_color_ramp(
        &self,
        band: &Band,
        profile: &RasterProfile,
        ramp: &ColorRamp,
        path: &Path,
    ) -> Result<(), RasterError>;
}
