//! Point reprojection between EPSG coordinate systems (proj4rs + crs-definitions).

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::RasterError;

/// EPSG code of WGS84 geographic coordinates.
pub const WGS84: u32 = 4326;
/// EPSG code of Web Mercator.
pub const WEB_MERCATOR: u32 = 3857;

/// Something that maps a point from one CRS into another.
pub trait CoordinateTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), RasterError>;
}

fn proj_string(epsg: u32) -> Result<&'static str, RasterError> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
        .ok_or_else(|| RasterError::Projection(format!("EPSG:{} not supported", epsg)))
}

fn is_geographic(proj4: &str) -> bool {
    proj4.contains("+proj=longlat")
}

/// Transformer between two EPSG codes. Geographic CRSs are taken and
/// returned in degrees.
pub struct EpsgTransform {
    source: Option<Proj>,
    target: Option<Proj>,
    source_geographic: bool,
    target_geographic: bool,
}

impl EpsgTransform {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, RasterError> {
        if source_epsg == target_epsg {
            return Ok(Self {
                source: None,
                target: None,
                source_geographic: false,
                target_geographic: false,
            });
        }

        let source_str = proj_string(source_epsg)?;
        let target_str = proj_string(target_epsg)?;
        let source = Proj::from_proj_string(source_str)
            .map_err(|e| RasterError::Projection(format!("EPSG:{}: {:?}", source_epsg, e)))?;
        let target = Proj::from_proj_string(target_str)
            .map_err(|e| RasterError::Projection(format!("EPSG:{}: {:?}", target_epsg, e)))?;

        Ok(Self {
            source: Some(source),
            target: Some(target),
            source_geographic: is_geographic(source_str),
            target_geographic: is_geographic(target_str),
        })
    }
}

impl CoordinateTransform for EpsgTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), RasterError> {
        let (Some(source), Some(target)) = (&self.source, &self.target) else {
            return Ok((x, y));
        };

        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source, target, &mut point)
            .map_err(|e| RasterError::Projection(format!("transform failed: {:?}", e)))?;

        let (px, py) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !px.is_finite() || !py.is_finite() {
            return Err(RasterError::Projection(format!(
                "non-finite result for ({}, {})",
                x, y
            )));
        }
        Ok((px, py))
    }
}
