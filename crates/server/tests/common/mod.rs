//! Common test utilities for in-process API testing with mocks.
//!
//! Builds the real router over a `PipelineScheduler` whose runner talks to
//! the in-memory collaborators from `sentinel_core::testing`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use sentinel_core::{
    acquisition::AcquisitionManager,
    auth::SharedToken,
    config::{Config, CopernicusConfig, FamilyConfig, PathsConfig},
    orchestrator::{PipelineRunner, PipelineScheduler},
    stage::StageName,
    testing::{
        MemoryRasterBackend, MemoryWatermarkStore, MockArchiveExtractor, MockArchiveFetcher,
        MockCatalog, MockTokenProvider,
    },
};

/// Re-export fixtures for test convenience
pub use sentinel_core::testing::fixtures;

pub const BOX: &str = "10,45,11,46";

/// In-process server with controllable collaborators.
pub struct TestFixture {
    pub router: Router,
    pub scheduler: Arc<PipelineScheduler>,
    pub catalog: Arc<MockCatalog>,
    pub backend: Arc<MemoryRasterBackend>,
    pub config: Config,
    /// Download, output and scratch directories live here.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            copernicus: CopernicusConfig {
                username: "user@example.com".to_string(),
                password: "hunter2".to_string(),
                ..CopernicusConfig::default()
            },
            paths: PathsConfig::rooted_at(temp_dir.path()),
            s2: FamilyConfig::enabled_with_boxes(&[BOX]).with_stages(&[StageName::TrueColor]),
            ..Config::default()
        };

        let catalog = Arc::new(MockCatalog::new());
        let backend = Arc::new(MemoryRasterBackend::new());
        let acquisition = AcquisitionManager::new(
            Arc::new(MockArchiveFetcher::new()),
            Arc::new(MockArchiveExtractor::new()),
            Arc::new(SharedToken::new(Arc::new(MockTokenProvider::new()))),
            &config.paths.download_dir,
        );
        let runner = PipelineRunner::new(
            config.clone(),
            catalog.clone(),
            Arc::new(MemoryWatermarkStore::new()),
            acquisition,
            backend.clone(),
        );
        let scheduler = Arc::new(PipelineScheduler::new(Arc::new(runner)));

        let state = Arc::new(sentinel_server::state::AppState::new(
            config.clone(),
            Arc::clone(&scheduler),
        ));
        let router = sentinel_server::api::create_router(state);

        Self {
            router,
            scheduler,
            catalog,
            backend,
            config,
            temp_dir,
        }
    }

    /// Wait until no run is in flight.
    pub async fn wait_idle(&self) {
        for _ in 0..200 {
            if !self.scheduler.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run did not finish in time");
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
