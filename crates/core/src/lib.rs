pub mod acquisition;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod metrics;
pub mod orchestrator;
pub mod raster;
pub mod stage;
pub mod testing;
pub mod watermark;

pub use acquisition::{
    AcquiredProduct, AcquisitionError, AcquisitionManager, HttpArchiveFetcher, ZipExtractor,
};
pub use auth::{AuthError, CopernicusAuth, SharedToken, TokenProvider};
pub use catalog::{
    BoundingBox, CatalogClient, CopernicusCatalog, ProductDescriptor, SatelliteFamily,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use discovery::{Discovery, SearchCoordinator, SearchError};
pub use dispatcher::{DispatchError, StageDispatcher, StageResult};
pub use orchestrator::{PipelineError, PipelineRunner, PipelineScheduler, RunSummary};
pub use raster::{GdalCliBackend, RasterBackend, RasterError};
pub use stage::{StageName, StageRunner, StageScope};
pub use watermark::{JsonWatermarkStore, Watermark, WatermarkStore};
