//! REST client for the ComfyUI HTTP endpoints.
//!
//! Implements [`EngineApi`] over the engine's `/prompt`, `/queue`,
//! `/history`, `/interrupt`, `/view`, and `/system_stats` endpoints using
//! [`reqwest`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::engine::{EngineApi, EngineApiError, HistoryEntry, QueueSnapshot, SubmitResponse};

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

impl ComfyUIApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (connection pooling across callers).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code.  Returns the
    /// response unchanged on success, or an [`EngineApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl EngineApi for ComfyUIApi {
    /// `POST /prompt` with the workflow JSON and client-correlation id.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, EngineApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /queue` -- live pending/running lists.
    async fn get_queue(&self) -> Result<QueueSnapshot, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/queue", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /history/{prompt_id}` -- the engine returns an object keyed by
    /// prompt id; an empty object means the job is not in history yet.
    async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let mut entries: HashMap<String, HistoryEntry> = Self::parse_response(response).await?;
        Ok(entries.remove(prompt_id))
    }

    /// `POST /interrupt` -- interrupts whatever is executing right now;
    /// this endpoint does not target a specific prompt.
    async fn interrupt(&self) -> Result<(), EngineApiError> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.api_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// `POST /queue` with a delete list -- removes a pending job.
    async fn delete_from_queue(&self, prompt_id: &str) -> Result<(), EngineApiError> {
        let body = serde_json::json!({
            "delete": [prompt_id],
        });

        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// `GET /view?filename=...&subfolder=...&type=output` -- artifact bytes.
    async fn download_file(
        &self,
        filename: &str,
        subfolder: &str,
    ) -> Result<Vec<u8>, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", "output"),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// `GET /system_stats` -- used purely as a liveness probe.
    async fn get_system_stats(&self) -> Result<serde_json::Value, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
