//! Artifact retrieval: locate a finished job's output in the engine
//! history and persist it under the local web root.
//!
//! History writes on the engine side are eventually consistent with queue
//! removal, so the lookup retries a bounded number of times before giving
//! up.  "Gave up" is reported as `None`, not an error -- the caller (the
//! background sweep) simply tries again on its next tick.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use genstudio_core::task::MediaKind;

use crate::engine::{EngineApi, OutputRef};

/// UTC timestamp component of generated filenames.
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Errors that fail a retrieval outright (as opposed to "not ready yet",
/// which is reported as `Ok(None)` and retried on a later sweep).
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Downloading the artifact bytes from the engine failed.
    #[error("Artifact download failed: {0}")]
    Download(#[from] crate::engine::EngineApiError),

    /// Writing the artifact to the local output tree failed.
    #[error("Artifact write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Tunable parameters for the history-lookup retry loop.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Maximum history lookups per retrieval call.
    pub attempts: u32,
    /// Delay between lookups.
    pub retry_delay: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputDir
// ---------------------------------------------------------------------------

/// Writer for the local web-servable output tree.
///
/// Artifacts land under `{root}/{subfolder}/{filename}` and are served to
/// browsers at `/{subfolder}/{filename}`.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to `{root}/{subfolder}/{filename}`, creating the
    /// subfolder if absent.  Returns the absolute path written.
    pub async fn write(
        &self,
        subfolder: &str,
        filename: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let dir = self.root.join(subfolder);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// FileRetriever
// ---------------------------------------------------------------------------

/// Downloads a completed job's artifact and persists it locally.
pub struct FileRetriever {
    engine: Arc<dyn EngineApi>,
    output: OutputDir,
    config: RetrievalConfig,
}

impl FileRetriever {
    pub fn new(engine: Arc<dyn EngineApi>, output: OutputDir, config: RetrievalConfig) -> Self {
        Self {
            engine,
            output,
            config,
        }
    }

    /// Locate and persist the artifact for `prompt_id`.
    ///
    /// Returns the web-relative path (`/{subfolder}/{filename}`) on
    /// success.  Returns `Ok(None)` when the history entry or its outputs
    /// are not present after all attempts ("not ready yet" -- the sweep
    /// retries on its next tick) or when the token is cancelled mid-wait.
    /// Download and filesystem failures are hard errors.
    pub async fn get_generated_file(
        &self,
        prompt_id: &str,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, RetrievalError> {
        for attempt in 1..=self.config.attempts {
            match self.engine.get_history(prompt_id).await {
                Ok(Some(entry)) => {
                    if let Some(output) = entry.first_output() {
                        return self.download(prompt_id, kind, output).await.map(Some);
                    }
                    tracing::debug!(
                        prompt_id,
                        attempt,
                        "History entry present but outputs not recorded yet",
                    );
                }
                Ok(None) => {
                    tracing::debug!(prompt_id, attempt, "Job not in history yet");
                }
                Err(e) => {
                    tracing::warn!(prompt_id, attempt, error = %e, "History lookup failed");
                }
            }

            if attempt < self.config.attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(prompt_id, "Artifact retrieval cancelled");
                        return Ok(None);
                    }
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }
        }

        tracing::debug!(
            prompt_id,
            attempts = self.config.attempts,
            "No output reference found; will retry on a later sweep",
        );
        Ok(None)
    }

    /// Fetch the artifact bytes and write them under the output root.
    async fn download(
        &self,
        prompt_id: &str,
        kind: MediaKind,
        output: &OutputRef,
    ) -> Result<String, RetrievalError> {
        let filename = generated_filename(kind, prompt_id, &output.filename);
        let subfolder = kind.output_subfolder();

        let bytes = self
            .engine
            .download_file(&output.filename, &output.subfolder)
            .await
            .map_err(|e| {
                tracing::error!(
                    prompt_id,
                    source_file = %output.filename,
                    error = %e,
                    "Artifact download failed",
                );
                e
            })?;

        let path = self.output.write(subfolder, &filename, &bytes).await?;
        tracing::info!(
            prompt_id,
            path = %path.display(),
            size_bytes = bytes.len(),
            "Artifact saved",
        );
        Ok(format!("/{subfolder}/{filename}"))
    }
}

/// Compose `{prefix}_{prompt_id}_{UTC timestamp}.{ext}`.
///
/// The extension is taken from the engine-side filename when present,
/// falling back to the kind's default container.
fn generated_filename(kind: MediaKind, prompt_id: &str, source_filename: &str) -> String {
    let extension = Path::new(source_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_else(|| kind.default_extension());
    let timestamp = Utc::now().format(FILE_TIMESTAMP_FORMAT);
    format!("{}_{prompt_id}_{timestamp}.{extension}", kind.file_prefix())
}
