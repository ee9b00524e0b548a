use sha2::{Digest, Sha256};
use std::sync::Arc;

use sentinel_core::{Config, PipelineScheduler, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    scheduler: Arc<PipelineScheduler>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<PipelineScheduler>) -> Self {
        let config_hash = config_fingerprint(&config);
        Self {
            config,
            config_hash,
            scheduler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Short hash of the loaded configuration, credentials included.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn scheduler(&self) -> &PipelineScheduler {
        self.scheduler.as_ref()
    }
}

/// First 16 hex digits of the SHA-256 of the serialized config.
pub fn config_fingerprint(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    hash[..16].to_string()
}
