//! Configuration for the raster backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the GDAL command-line backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Path to gdalinfo binary.
    #[serde(default = "default_gdalinfo_path")]
    pub gdalinfo_path: PathBuf,

    /// Path to gdal_translate binary.
    #[serde(default = "default_gdal_translate_path")]
    pub gdal_translate_path: PathBuf,

    /// Path to gdalwarp binary.
    #[serde(default = "default_gdalwarp_path")]
    pub gdalwarp_path: PathBuf,

    /// Path to gdaldem binary.
    #[serde(default = "default_gdaldem_path")]
    pub gdaldem_path: PathBuf,

    /// Directory for raw sample files and VRTs.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Timeout for a single tool invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Optional gdaldem color file for the vegetation index ramp.
    #[serde(default)]
    pub ndvi_color_file: Option<PathBuf>,
}

fn default_gdalinfo_path() -> PathBuf {
    PathBuf::from("gdalinfo")
}

fn default_gdal_translate_path() -> PathBuf {
    PathBuf::from("gdal_translate")
}

fn default_gdalwarp_path() -> PathBuf {
    PathBuf::from("gdalwarp")
}

fn default_gdaldem_path() -> PathBuf {
    PathBuf::from("gdaldem")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("sentinel-raster")
}

fn default_timeout() -> u64 {
    1800 // 30 minutes
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            gdalinfo_path: default_gdalinfo_path(),
            gdal_translate_path: default_gdal_translate_path(),
            gdalwarp_path: default_gdalwarp_path(),
            gdaldem_path: default_gdaldem_path(),
            temp_dir: default_temp_dir(),
            timeout_secs: default_timeout(),
            ndvi_color_file: None,
        }
    }
}

impl RasterConfig {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}
