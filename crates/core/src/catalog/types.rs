//! Types for the product catalog: satellite families, query regions and descriptors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two supported satellite families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SatelliteFamily {
    /// Sentinel-1, C-band radar.
    S1,
    /// Sentinel-2, multispectral optical.
    S2,
}

impl SatelliteFamily {
    /// All families in processing order.
    pub const ALL: [SatelliteFamily; 2] = [SatelliteFamily::S1, SatelliteFamily::S2];

    /// Short upper-case label ("S1", "S2").
    pub fn as_str(&self) -> &'static str {
        match self {
            SatelliteFamily::S1 => "S1",
            SatelliteFamily::S2 => "S2",
        }
    }

    /// Collection name used by the Copernicus catalogue.
    pub fn collection(&self) -> &'static str {
        match self {
            SatelliteFamily::S1 => "Sentinel1",
            SatelliteFamily::S2 => "Sentinel2",
        }
    }

    /// Lower-case directory name under the output root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SatelliteFamily::S1 => "s1",
            SatelliteFamily::S2 => "s2",
        }
    }

    /// Product type searched for when none is configured.
    pub fn default_product_type(&self) -> &'static str {
        match self {
            SatelliteFamily::S1 => "GRD",
            SatelliteFamily::S2 => "L2A",
        }
    }

    /// Name of the manifest file inside an extracted product.
    pub fn manifest_file_name(&self, product_type: &str) -> String {
        match self {
            SatelliteFamily::S1 => "manifest.safe".to_string(),
            SatelliteFamily::S2 => format!("MTD_MSI{}.xml", product_type),
        }
    }
}

impl fmt::Display for SatelliteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SatelliteFamily {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S1" | "SENTINEL1" | "SENTINEL-1" => Ok(SatelliteFamily::S1),
            "S2" | "SENTINEL2" | "SENTINEL-2" => Ok(SatelliteFamily::S2),
            other => Err(CatalogError::UnknownFamily(other.to_string())),
        }
    }
}

/// A geographic query region in EPSG:4326 degrees.
///
/// Parsed from and rendered as `"west,south,east,north"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Create a box, rejecting degenerate or inverted extents.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, CatalogError> {
        let all_finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !all_finite || west >= east || south >= north {
            return Err(CatalogError::InvalidBox(format!(
                "{},{},{},{}",
                west, south, east, north
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Box as the catalogue expects it in the `box` query parameter.
    pub fn to_query_string(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    /// Filesystem-safe form used as an output name prefix.
    pub fn slug(&self) -> String {
        self.to_query_string().replace(',', "_")
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl FromStr for BoundingBox {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CatalogError::InvalidBox(s.to_string()));
        }
        let mut coords = [0.0f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| CatalogError::InvalidBox(s.to_string()))?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }
}

impl TryFrom<String> for BoundingBox {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BoundingBox> for String {
    fn from(value: BoundingBox) -> Self {
        value.to_query_string()
    }
}

/// Parse a region list given either as a JSON array of box strings or as a
/// single box string.
pub fn parse_boxes(raw: &str) -> Result<Vec<BoundingBox>, CatalogError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list.iter().map(|b| b.parse()).collect(),
        Err(_) => Ok(vec![raw.parse()?]),
    }
}

/// One product returned by the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Catalogue UUID, also the download key.
    pub id: String,
    /// Product title, e.g. `S2A_MSIL2A_..._T32TQM_....SAFE`.
    pub title: String,
    pub family: SatelliteFamily,
    /// Product type the query filtered on ("L2A", "GRD").
    pub product_type: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    /// The region whose query returned this product.
    pub region: BoundingBox,
}

impl ProductDescriptor {
    /// Manifest file name expected inside the extracted product.
    pub fn manifest_file_name(&self) -> String {
        self.family.manifest_file_name(&self.product_type)
    }
}

/// A single catalogue page request.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub family: SatelliteFamily,
    pub region: BoundingBox,
    pub product_type: String,
    /// Lower bound on sensing start.
    pub start: DateTime<Utc>,
    /// Maximum acceptable cloud cover in percent (S2 only).
    pub max_cloud_cover: Option<f64>,
    pub max_records: u32,
    /// 1-based page index.
    pub page: u32,
    pub sort_param: String,
    pub sort_order: String,
}

/// Errors from catalogue operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog request timed out")]
    Timeout,

    #[error("Catalog connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse catalog response: {0}")]
    Parse(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBox(String),

    #[error("Unknown satellite family: {0}")]
    UnknownFamily(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_box() {
        let b: BoundingBox = "10,45,11,46".parse().unwrap();
        assert_eq!(b.west, 10.0);
        assert_eq!(b.north, 46.0);
        assert_eq!(b.to_query_string(), "10,45,11,46");
        assert_eq!(b.slug(), "10_45_11_46");
    }

    #[test]
    fn test_parse_box_fractional() {
        let b: BoundingBox = " 10.25, 45.5 ,11,46".parse().unwrap();
        assert_eq!(b.slug(), "10.25_45.5_11_46");
    }

    #[test]
    fn test_inverted_box_rejected() {
        assert!("11,45,10,46".parse::<BoundingBox>().is_err());
        assert!("10,46,11,45".parse::<BoundingBox>().is_err());
        assert!("10,45,11".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn test_parse_boxes_json_list() {
        let boxes = parse_boxes(r#"["10,45,11,46", "12,40,13,41"]"#).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].west, 12.0);
    }

    #[test]
    fn test_parse_boxes_single() {
        let boxes = parse_boxes("10,45,11,46").unwrap();
        assert_eq!(boxes.len(), 1);
        assert!(parse_boxes("").unwrap().is_empty());
    }

    #[test]
    fn test_box_serde_as_string() {
        let b: BoundingBox = "1,2,3,4".parse().unwrap();
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "\"1,2,3,4\"");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_family_helpers() {
        assert_eq!("sentinel2".parse::<SatelliteFamily>().unwrap(), SatelliteFamily::S2);
        assert_eq!(SatelliteFamily::S1.collection(), "Sentinel1");
        assert_eq!(SatelliteFamily::S1.manifest_file_name("GRD"), "manifest.safe");
        assert_eq!(SatelliteFamily::S2.manifest_file_name("L2A"), "MTD_MSIL2A.xml");
        assert!("S3".parse::<SatelliteFamily>().is_err());
    }
}
