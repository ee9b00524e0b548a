//! OpenID-Connect token provider for the Copernicus identity service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CopernicusConfig;

use super::{AccessToken, AuthError, TokenProvider};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Password-grant token provider that refreshes via the refresh-token grant.
pub struct CopernicusAuth {
    client: Client,
    token_url: String,
    client_id: String,
    username: String,
    password: String,
    refresh_token: Mutex<Option<String>>,
}

impl CopernicusAuth {
    pub fn new(config: &CopernicusConfig) -> Result<Self, AuthError> {
        if config.username.is_empty() {
            return Err(AuthError::ConfigurationError(
                "copernicus.username must be set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            refresh_token: Mutex::new(None),
        })
    }

    async fn grant(&self, form: &[(&str, &str)]) -> Result<AccessToken, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials(body));
        }
        if !status.is_success() {
            return Err(AuthError::ServiceUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        *self.refresh_token.lock().await = parsed.refresh_token;

        let mut token = AccessToken::new(parsed.access_token);
        if let Some(secs) = parsed.expires_in {
            token = token.with_expiry(Utc::now() + chrono::Duration::seconds(secs));
        }
        Ok(token)
    }

    async fn password_grant(&self) -> Result<AccessToken, AuthError> {
        debug!(username = %self.username, "Requesting token with password grant");
        self.grant(&[
            ("client_id", self.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("grant_type", "password"),
        ])
        .await
    }
}

#[async_trait]
impl TokenProvider for CopernicusAuth {
    fn name(&self) -> &str {
        "copernicus"
    }

    async fn token(&self) -> Result<AccessToken, AuthError> {
        self.password_grant().await
    }

    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        let refresh_token = self.refresh_token.lock().await.clone();
        let Some(refresh_token) = refresh_token else {
            return self.password_grant().await;
        };

        debug!("Refreshing token");
        match self
            .grant(&[
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await
        {
            Ok(token) => Ok(token),
            Err(AuthError::InvalidCredentials(reason)) => {
                warn!(%reason, "Refresh token rejected, falling back to password grant");
                self.password_grant().await
            }
            Err(e) => Err(e),
        }
    }
}
