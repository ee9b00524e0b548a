use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::catalog::{parse_boxes, BoundingBox, CatalogError, SatelliteFamily};
use crate::orchestrator::RunnerConfig;
use crate::raster::RasterConfig;
use crate::stage::{StageName, StageScope};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub copernicus: CopernicusConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub s1: FamilyConfig,
    #[serde(default)]
    pub s2: FamilyConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub raster: RasterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn family(&self, family: SatelliteFamily) -> &FamilyConfig {
        match family {
            SatelliteFamily::S1 => &self.s1,
            SatelliteFamily::S2 => &self.s2,
        }
    }

    pub fn family_mut(&mut self, family: SatelliteFamily) -> &mut FamilyConfig {
        match family {
            SatelliteFamily::S1 => &mut self.s1,
            SatelliteFamily::S2 => &mut self.s2,
        }
    }

    /// Families with `enabled = true`, S1 first.
    pub fn enabled_families(&self) -> Vec<SatelliteFamily> {
        SatelliteFamily::ALL
            .into_iter()
            .filter(|f| self.family(*f).enabled)
            .collect()
    }
}

/// Copernicus Data Space endpoints and credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CopernicusConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Base of the collections endpoint; `/<collection>/search.json` is appended.
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Base of the download endpoint; `/<product id>` is appended.
    #[serde(default = "default_download_url")]
    pub download_url: String,
    /// Request timeout for search and token calls (seconds).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_client_id() -> String {
    "cdse-public".to_string()
}

fn default_token_url() -> String {
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token"
        .to_string()
}

fn default_catalog_url() -> String {
    "https://catalogue.dataspace.copernicus.eu/resto/api/collections".to_string()
}

fn default_download_url() -> String {
    "https://download.dataspace.copernicus.eu/download".to_string()
}

fn default_http_timeout() -> u64 {
    60
}

impl Default for CopernicusConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            token_url: default_token_url(),
            catalog_url: default_catalog_url(),
            download_url: default_download_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl CopernicusConfig {
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Archives are downloaded and extracted here.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Root of the `<s1|s2>/<stage>/` output tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding `<family>_watermark.json`.
    #[serde(default = "default_watermark_dir")]
    pub watermark_dir: PathBuf,
    /// Per-run, per-product scratch directories live under here.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_watermark_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("sentinel-scratch")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            output_dir: default_output_dir(),
            watermark_dir: default_watermark_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl PathsConfig {
    /// All four directories under one root (useful for tests).
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            download_dir: root.join("download"),
            output_dir: root.join("output"),
            watermark_dir: root.clone(),
            scratch_dir: root.join("scratch"),
        }
    }
}

/// Query regions, given as a list or as a JSON/single-box string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BoxList {
    List(Vec<String>),
    Raw(String),
}

impl Default for BoxList {
    fn default() -> Self {
        BoxList::List(Vec::new())
    }
}

impl BoxList {
    pub fn parse(&self) -> Result<Vec<BoundingBox>, CatalogError> {
        match self {
            BoxList::List(items) => items.iter().map(|b| b.parse()).collect(),
            BoxList::Raw(raw) => parse_boxes(raw),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            BoxList::List(items) => items.is_empty(),
            BoxList::Raw(raw) => raw.trim().is_empty() || raw.trim() == "[]",
        }
    }
}

/// Stage names, given as a list or as a comma-separated string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StageList {
    List(Vec<String>),
    Csv(String),
}

impl StageList {
    pub fn parse(&self) -> Result<Vec<StageName>, String> {
        let names: Vec<&str> = match self {
            StageList::List(items) => items.iter().map(String::as_str).collect(),
            StageList::Csv(raw) => raw.split(',').collect(),
        };
        names
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::parse)
            .collect()
    }
}

/// Per-family discovery and processing settings (`[s1]`, `[s2]`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FamilyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub boxes: BoxList,
    /// Catalogue product type; family default when absent.
    #[serde(default)]
    pub product_type: Option<String>,
    /// Maximum cloud cover in percent; only sent for S2.
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    #[serde(default = "default_max_records")]
    pub max_records: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_sort_param")]
    pub sort_param: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Search floor used when no watermark exists yet; yesterday when absent.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub stages: Option<StageList>,
    #[serde(default)]
    pub scope: StageScope,
    /// Lower percentile of the percentile stretch (upper is `100 - p`).
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    #[serde(default)]
    pub web_mercator_copy: Option<bool>,
}

fn default_max_records() -> u32 {
    5
}

fn default_max_pages() -> u32 {
    1
}

fn default_sort_param() -> String {
    "startDate".to_string()
}

fn default_sort_order() -> String {
    "descending".to_string()
}

fn default_percentile() -> f64 {
    2.0
}

const S2_DEFAULT_CLOUD_COVER: f64 = 5.0;

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            boxes: BoxList::default(),
            product_type: None,
            cloud_cover: None,
            max_records: default_max_records(),
            max_pages: default_max_pages(),
            sort_param: default_sort_param(),
            sort_order: default_sort_order(),
            start_date: None,
            stages: None,
            scope: StageScope::default(),
            percentile: default_percentile(),
            web_mercator_copy: None,
        }
    }
}

impl FamilyConfig {
    pub fn enabled_with_boxes(boxes: &[&str]) -> Self {
        Self {
            enabled: true,
            boxes: BoxList::List(boxes.iter().map(|b| b.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_stages(mut self, stages: &[StageName]) -> Self {
        self.stages = Some(StageList::List(
            stages.iter().map(|s| s.as_str().to_string()).collect(),
        ));
        self
    }

    pub fn with_scope(mut self, scope: StageScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn regions(&self) -> Result<Vec<BoundingBox>, CatalogError> {
        self.boxes.parse()
    }

    pub fn product_type_for(&self, family: SatelliteFamily) -> String {
        self.product_type
            .clone()
            .unwrap_or_else(|| family.default_product_type().to_string())
    }

    pub fn cloud_cover_for(&self, family: SatelliteFamily) -> Option<f64> {
        match family {
            SatelliteFamily::S1 => None,
            SatelliteFamily::S2 => Some(self.cloud_cover.unwrap_or(S2_DEFAULT_CLOUD_COVER)),
        }
    }

    pub fn stages_for(&self, family: SatelliteFamily) -> Result<Vec<StageName>, String> {
        match &self.stages {
            Some(list) => list.parse(),
            None => Ok(StageName::defaults_for(family)),
        }
    }

    pub fn web_mercator_copy_for(&self, family: SatelliteFamily) -> bool {
        self.web_mercator_copy
            .unwrap_or(family == SatelliteFamily::S2)
    }

    /// Search floor for a family without a watermark.
    pub fn default_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = self
            .start_date
            .unwrap_or_else(|| (now - Duration::days(1)).date_naive());
        date.and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(now)
    }
}

/// Status API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Log output format
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for API responses (password redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub copernicus: SanitizedCopernicusConfig,
    pub paths: PathsConfig,
    pub s1: FamilyConfig,
    pub s2: FamilyConfig,
    pub runner: RunnerConfig,
    pub raster: RasterConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Copernicus settings with credentials reduced to a flag.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCopernicusConfig {
    pub username: String,
    pub password_configured: bool,
    pub client_id: String,
    pub token_url: String,
    pub catalog_url: String,
    pub download_url: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let c = &config.copernicus;
        Self {
            copernicus: SanitizedCopernicusConfig {
                username: c.username.clone(),
                password_configured: !c.password.is_empty(),
                client_id: c.client_id.clone(),
                token_url: c.token_url.clone(),
                catalog_url: c.catalog_url.clone(),
                download_url: c.download_url.clone(),
                timeout_secs: c.timeout_secs,
            },
            paths: config.paths.clone(),
            s1: config.s1.clone(),
            s2: config.s2.clone(),
            runner: config.runner.clone(),
            raster: config.raster.clone(),
            server: config.server.clone(),
            logging: config.logging.clone(),
        }
    }
}
