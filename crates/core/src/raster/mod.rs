//! Raster backend abstraction, band math and windowing geometry.

mod color_ramp;
mod config;
mod error;
mod gdal_cli;
pub mod normalize;
pub mod projection;
mod traits;
mod types;
pub mod window;

pub use color_ramp::{ColorRamp, ColorStop};
pub use config::RasterConfig;
pub use error::RasterError;
pub use gdal_cli::GdalCliBackend;
pub use traits::RasterBackend;
pub use types::{
    Band, ByteBand, DatasetInfo, GeoTransform, PixelWindow, Polarization, RasterImage,
    RasterProfile, SubdatasetRef,
};
pub use window::compute_window;
