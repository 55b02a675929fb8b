use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draft_store_core::{UploadError, UploadHandler};
use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::{debug, instrument};

/// Request body sent to the upload endpoint.
#[derive(Debug, Serialize)]
struct UploadBody<'a> {
    id: &'a str,
    content: &'a str,
    timestamp: DateTime<Utc>,
}

/// Upload handler that POSTs the draft as JSON.
///
/// Any 2xx response counts as accepted. Other statuses are rejections; connection
/// problems are transport errors. Either way the draft stays local.
#[derive(Debug, Clone)]
pub struct HttpUploadHandler {
    http_client: HttpClient,
    url: String,
    draft_id: String,
}

impl HttpUploadHandler {
    /// Build a handler whose requests give up after `timeout`.
    pub fn new(
        url: impl Into<String>,
        draft_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http_client, url, draft_id))
    }

    /// Use a preconfigured client (timeouts, proxies, TLS roots).
    pub fn with_client(
        http_client: HttpClient,
        url: impl Into<String>,
        draft_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            url: url.into(),
            draft_id: draft_id.into(),
        }
    }
}

#[async_trait]
impl UploadHandler for HttpUploadHandler {
    #[instrument(skip(self, content), level = "debug", fields(url = %self.url, content_len = content.len()))]
    async fn upload(&self, content: &str) -> Result<(), UploadError> {
        let body = UploadBody {
            id: &self.draft_id,
            content,
            timestamp: Utc::now(),
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Transport(format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected(format!(
                "POST {} returned {}: {}",
                self.url, status, text
            )));
        }

        debug!("POST {} accepted draft {} ({})", self.url, self.draft_id, status);
        Ok(())
    }
}
