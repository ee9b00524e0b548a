//! Archive download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::AccessToken;
use crate::config::CopernicusConfig;

use super::FetchError;

/// Downloads product archives by id.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Download the archive for `product_id` to `dest`, returning its size.
    ///
    /// On failure nothing is left at `dest`.
    async fn download(
        &self,
        product_id: &str,
        token: &AccessToken,
        dest: &Path,
    ) -> Result<u64, FetchError>;
}

/// Streams `{download_url}/{id}` with a bearer token.
pub struct HttpArchiveFetcher {
    client: Client,
    base_url: String,
}

impl HttpArchiveFetcher {
    pub fn new(config: &CopernicusConfig) -> Result<Self, FetchError> {
        // Archives are large; only bound the connection phase.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.download_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, product_id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(product_id))
    }

    async fn stream_to(
        &self,
        product_id: &str,
        token: &AccessToken,
        part: &Path,
    ) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Unauthorized(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut file = tokio::fs::File::create(part).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Connection(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn download(
        &self,
        product_id: &str,
        token: &AccessToken,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let part = part_path(dest);
        debug!(product_id, dest = %dest.display(), "Downloading archive");

        match self.stream_to(product_id, token, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest).await?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}
