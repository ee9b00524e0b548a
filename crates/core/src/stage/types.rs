//! Stage names, scopes and outcomes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::SatelliteFamily;
use crate::raster::RasterError;

/// One derived-product computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StageName {
    TrueColor,
    FalseColorNir,
    AtmosphericPenetration,
    VegetationIndex,
    PolarizationVv,
    PolarizationVh,
    /// VV / VH.
    Ratio,
    /// VH / VV.
    RatioInverse,
    Product,
    Difference,
}

impl StageName {
    pub const ALL: [StageName; 10] = [
        StageName::TrueColor,
        StageName::FalseColorNir,
        StageName::AtmosphericPenetration,
        StageName::VegetationIndex,
        StageName::PolarizationVv,
        StageName::PolarizationVh,
        StageName::Ratio,
        StageName::RatioInverse,
        StageName::Product,
        StageName::Difference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::TrueColor => "TRUE_COLOR",
            StageName::FalseColorNir => "FALSE_COLOR_NIR",
            StageName::AtmosphericPenetration => "ATMOSPHERIC_PENETRATION",
            StageName::VegetationIndex => "VEGETATION_INDEX",
            StageName::PolarizationVv => "POLARIZATION_VV",
            StageName::PolarizationVh => "POLARIZATION_VH",
            StageName::Ratio => "RATIO",
            StageName::RatioInverse => "RATIO_INVERSE",
            StageName::Product => "PRODUCT",
            StageName::Difference => "DIFFERENCE",
        }
    }

    /// Family whose products this stage applies to.
    pub fn family(&self) -> SatelliteFamily {
        match self {
            StageName::TrueColor
            | StageName::FalseColorNir
            | StageName::AtmosphericPenetration
            | StageName::VegetationIndex => SatelliteFamily::S2,
            _ => SatelliteFamily::S1,
        }
    }

    /// Directory under `<output>/<family>/` holding this stage's files.
    pub fn dir_name(&self) -> &'static str {
        match self {
            StageName::TrueColor => "tci",
            StageName::FalseColorNir => "nirfc",
            StageName::AtmosphericPenetration => "ap",
            StageName::VegetationIndex => "ndvi",
            StageName::PolarizationVv => "vv",
            StageName::PolarizationVh => "vh",
            StageName::Ratio => "ratiovvvh",
            StageName::RatioInverse => "ratiovhvv",
            StageName::Product => "productvvvh",
            StageName::Difference => "diffvvvh",
        }
    }

    /// File name suffix, appended as `<name>-<SUFFIX>.tif`.
    pub fn suffix(&self) -> &'static str {
        match self {
            StageName::TrueColor => "TCI",
            StageName::FalseColorNir => "NIRFC",
            StageName::AtmosphericPenetration => "AP",
            StageName::VegetationIndex => "NDVI",
            StageName::PolarizationVv => "VV",
            StageName::PolarizationVh => "VH",
            StageName::Ratio => "RATIOVVVH",
            StageName::RatioInverse => "RATIOVHVV",
            StageName::Product => "PRODUCT",
            StageName::Difference => "DIFFERENCE",
        }
    }

    /// Stages enabled for a family when none are configured.
    pub fn defaults_for(family: SatelliteFamily) -> Vec<StageName> {
        match family {
            SatelliteFamily::S1 => vec![
                StageName::PolarizationVv,
                StageName::PolarizationVh,
                StageName::Ratio,
            ],
            SatelliteFamily::S2 => vec![
                StageName::TrueColor,
                StageName::FalseColorNir,
                StageName::AtmosphericPenetration,
                StageName::VegetationIndex,
            ],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.trim().to_ascii_uppercase().as_str() {
            "TRUE_COLOR" | "TCI" => StageName::TrueColor,
            "FALSE_COLOR_NIR" | "NIRFC" => StageName::FalseColorNir,
            "ATMOSPHERIC_PENETRATION" | "AP" => StageName::AtmosphericPenetration,
            "VEGETATION_INDEX" | "NDVI" => StageName::VegetationIndex,
            "POLARIZATION_VV" | "VV" => StageName::PolarizationVv,
            "POLARIZATION_VH" | "VH" => StageName::PolarizationVh,
            "RATIO" | "RATIOVVVH" => StageName::Ratio,
            "RATIO_INVERSE" | "RATIOVHVV" => StageName::RatioInverse,
            "PRODUCT" | "PRODUCTVVVH" => StageName::Product,
            "DIFFERENCE" | "DIFFVVVH" => StageName::Difference,
            other => return Err(format!("unknown stage: {}", other)),
        };
        Ok(name)
    }
}

impl TryFrom<String> for StageName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StageName> for String {
    fn from(value: StageName) -> Self {
        value.as_str().to_string()
    }
}

/// Whether stages read the whole tile or only the query region's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageScope {
    #[default]
    Tile,
    Box,
}

/// How raw samples become display bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationKind {
    Percentile,
    MinMax,
    FixedRange,
    /// Native float output rendered through a color ramp.
    ColorRamp,
}

/// A stage output that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub stage: StageName,
    pub product_id: String,
}

/// Result of one stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The output was computed and written by this call.
    Computed(OutputArtifact),
    /// The output already existed; no source data was read.
    Skipped(OutputArtifact),
}

impl StageOutcome {
    pub fn artifact(&self) -> &OutputArtifact {
        match self {
            StageOutcome::Computed(a) | StageOutcome::Skipped(a) => a,
        }
    }
}

/// Failure of a single stage for a single product.
#[derive(Debug, Error)]
pub enum StageComputeError {
    #[error("Stage {stage} could not read input for {product_id}: {source}")]
    Read {
        stage: StageName,
        product_id: String,
        #[source]
        source: RasterError,
    },

    #[error("Stage {stage} band shape mismatch for {product_id}: {detail}")]
    ShapeMismatch {
        stage: StageName,
        product_id: String,
        detail: String,
    },

    #[error("Stage {stage} could not write {path}: {source}")]
    Write {
        stage: StageName,
        path: PathBuf,
        #[source]
        source: RasterError,
    },

    #[error("Stage {stage} is not applicable to {family} products")]
    WrongFamily {
        stage: StageName,
        family: SatelliteFamily,
    },

    #[error("I/O error in stage {stage}: {source}")]
    Io {
        stage: StageName,
        #[source]
        source: std::io::Error,
    },
}
