//! Raster data types shared by backends and stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RasterError;

/// Sentinel-1 polarization channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    Vv,
    Vh,
}

impl Polarization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarization::Vv => "VV",
            Polarization::Vh => "VH",
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which band group of a product a stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubdatasetRef {
    /// Zero-based subdataset of a multi-resolution product
    /// (S2: 0 = 10 m, 1 = 20 m, 2 = 60 m, 3 = TCI).
    Index(usize),
    /// Calibrated amplitude of one S1 polarization, reprojected to EPSG:3857.
    Amplitude(Polarization),
}

/// Affine pixel-to-world transform in GDAL coefficient order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform from an origin and pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    /// World coordinates of a (fractional) pixel position.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let g = &self.0;
        (
            g[0] + col * g[1] + row * g[2],
            g[3] + col * g[4] + row * g[5],
        )
    }

    /// The inverse (world-to-pixel) transform.
    pub fn invert(&self) -> Result<GeoTransform, RasterError> {
        let g = &self.0;
        let det = g[1] * g[5] - g[2] * g[4];
        if det == 0.0 || !det.is_finite() {
            return Err(RasterError::Projection(
                "geotransform is not invertible".to_string(),
            ));
        }
        let inv_det = 1.0 / det;
        let a = g[5] * inv_det;
        let b = -g[2] * inv_det;
        let d = -g[4] * inv_det;
        let e = g[1] * inv_det;
        Ok(GeoTransform([
            -g[0] * a - g[3] * b,
            a,
            b,
            -g[0] * d - g[3] * e,
            d,
            e,
        ]))
    }

    /// Transform of the sub-grid starting at a window's top-left pixel.
    pub fn for_window(&self, window: &PixelWindow) -> GeoTransform {
        let (x, y) = self.apply(window.col_off as f64, window.row_off as f64);
        let g = &self.0;
        GeoTransform([x, g[1], g[2], y, g[4], g[5]])
    }
}

/// Integer pixel window, always inside the dataset it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            col_off: 0,
            row_off: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Metadata of an opened dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    /// Backend-specific name used to reopen the dataset.
    pub source: String,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub transform: GeoTransform,
    /// EPSG code of the native CRS, when known.
    pub epsg: Option<u32>,
}

impl DatasetInfo {
    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::full(self.width, self.height)
    }
}

/// One band of samples at native precision, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Band {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, RasterError> {
        if data.len() != width * height {
            return Err(RasterError::ShapeMismatch {
                left: (width, height),
                right: (data.len(), 1),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

/// One band of display bytes, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBand {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ByteBand {
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

/// Georeferencing of an image to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub epsg: Option<u32>,
}

impl RasterProfile {
    /// Profile of a window read from `dataset`.
    pub fn for_window(dataset: &DatasetInfo, window: &PixelWindow) -> Self {
        Self {
            width: window.width,
            height: window.height,
            transform: dataset.transform.for_window(window),
            epsg: dataset.epsg,
        }
    }
}

/// A byte image ready for writing: bands, optional validity mask, georeferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub bands: Vec<ByteBand>,
    /// 1 where the pixel holds data, 0 where it is nodata.
    pub mask: Option<ByteBand>,
    pub profile: RasterProfile,
}
