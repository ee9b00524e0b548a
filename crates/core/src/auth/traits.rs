use async_trait::async_trait;
use thiserror::Error;

use super::types::AccessToken;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected token response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Whether a later attempt may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

/// Issues bearer tokens for archive downloads.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Name of this provider (for logging).
    fn name(&self) -> &str;

    /// Issue a token from primary credentials.
    async fn token(&self) -> Result<AccessToken, AuthError>;

    /// Obtain a new token, replacing the previous one.
    async fn refresh(&self) -> Result<AccessToken, AuthError>;
}
