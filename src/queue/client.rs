use std::time::Duration;

use reqwest::Client;

use super::error::QueueError;
use super::types::{CompleteRequest, PendingRender, PendingResponse};

/// Client for the render-queue worker API. All calls carry the worker's
/// bearer token and a bounded per-call timeout.
pub struct QueueClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl QueueClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// Fetch the list of jobs awaiting a render.
    pub async fn pending_renders(&self) -> Result<Vec<PendingRender>, QueueError> {
        let url = format!("{}/api/worker/pending-renders", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(QueueError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<PendingResponse>().await?;
        Ok(body.tracks)
    }

    /// Report a finished render, with its classified stem list, back to
    /// the queue. A non-2xx answer fails this job only.
    pub async fn complete_render(
        &self,
        job_id: &str,
        req: &CompleteRequest,
    ) -> Result<(), QueueError> {
        let url = format!("{}/api/worker/tracks/{}/complete", self.base_url, job_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(QueueError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Download a project archive. Locators may be absolute URLs or paths
    /// relative to the API base.
    pub async fn download(&self, locator: &str) -> Result<Vec<u8>, QueueError> {
        if locator.is_empty() {
            return Err(QueueError::InvalidLocator("empty archive locator".into()));
        }
        let url = if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            format!("{}{}", self.base_url, locator)
        };

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Api {
                status: status.as_u16(),
                message: format!("download failed for {url}"),
            });
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
