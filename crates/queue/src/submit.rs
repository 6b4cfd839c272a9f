//! Workflow submission adapter.
//!
//! Translates a kind-specific generation config into the engine's wire
//! format and submits it with a fresh client-correlation id.  A non-2xx
//! response, transport error, or per-node validation error all surface as
//! a [`SubmitError`]; the orchestrator turns that into a Failed task.

use std::sync::Arc;

use genstudio_comfyui::engine::{EngineApi, EngineApiError};
use genstudio_comfyui::workflow::build_workflow;
use genstudio_core::error::CoreError;
use genstudio_core::generation::GenerationConfig;

/// Reasons a submission yields no job id.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The config failed local range validation before any network call.
    #[error("Invalid generation config: {0}")]
    InvalidConfig(#[from] CoreError),

    /// The engine accepted the HTTP call but rejected the workflow.
    #[error("Workflow rejected by engine: {0}")]
    Rejected(String),

    /// The HTTP call itself failed.
    #[error("Engine unreachable or errored: {0}")]
    Engine(#[from] EngineApiError),
}

/// Kind-dispatched submission adapter.
pub struct Submitter {
    engine: Arc<dyn EngineApi>,
}

impl Submitter {
    pub fn new(engine: Arc<dyn EngineApi>) -> Self {
        Self { engine }
    }

    /// Build, serialize, and submit the workflow for `config`.
    ///
    /// Returns the engine-assigned prompt id on success.  Does not touch
    /// any task state; the caller records the outcome.
    pub async fn submit(&self, config: &GenerationConfig) -> Result<String, SubmitError> {
        config.validate()?;

        let workflow = build_workflow(config).to_prompt_format();
        let client_id = uuid::Uuid::new_v4().to_string();

        let response = self
            .engine
            .submit_workflow(&workflow, &client_id)
            .await
            .map_err(|e| {
                tracing::error!(kind = %config.kind(), error = %e, "Workflow submission failed");
                e
            })?;

        if !response.is_accepted() {
            let detail = serde_json::to_string(&response.node_errors)
                .unwrap_or_else(|_| "<unserializable node errors>".to_string());
            tracing::error!(
                kind = %config.kind(),
                prompt_id = %response.prompt_id,
                node_errors = %detail,
                "Engine reported node validation errors",
            );
            return Err(SubmitError::Rejected(detail));
        }

        tracing::info!(
            kind = %config.kind(),
            prompt_id = %response.prompt_id,
            queue_number = response.number,
            "Workflow submitted",
        );
        Ok(response.prompt_id)
    }
}
