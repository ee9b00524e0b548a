//! Mock token provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::{AccessToken, AuthError, TokenProvider};

/// Issues `mock-token-<n>` / `mock-refresh-<n>` tokens and counts issuances and refreshes.
#[derive(Debug, Default)]
pub struct MockTokenProvider {
    issued: Arc<RwLock<u64>>,
    refreshed: Arc<RwLock<u64>>,
    next_error: Arc<RwLock<Option<AuthError>>>,
    always_error: Arc<RwLock<Option<AuthError>>>,
    delay: Option<Duration>,
}

impl MockTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every token response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn issue_count(&self) -> u64 {
        *self.issued.read().await
    }

    pub async fn refresh_count(&self) -> u64 {
        *self.refreshed.read().await
    }

    /// Fail the next token request only.
    pub async fn set_next_error(&self, error: AuthError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every token request until cleared.
    pub async fn fail_always(&self, error: AuthError) {
        *self.always_error.write().await = Some(error);
    }

    pub async fn clear_errors(&self) {
        *self.next_error.write().await = None;
        *self.always_error.write().await = None;
    }

    async fn respond(&self, counter: &RwLock<u64>, kind: &str) -> Result<AccessToken, AuthError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(err) = self.always_error.read().await.clone() {
            return Err(err);
        }
        let mut count = counter.write().await;
        *count += 1;
        Ok(AccessToken::new(format!("mock-{}-{}", kind, *count)))
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn token(&self) -> Result<AccessToken, AuthError> {
        self.respond(&self.issued, "token").await
    }

    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        self.respond(&self.refreshed, "refresh").await
    }
}
