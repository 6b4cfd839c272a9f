//! Engine client abstraction and wire types.
//!
//! [`EngineApi`] is the seam between the queue core and the external
//! workflow engine.  Production code uses [`crate::api::ComfyUIApi`];
//! tests substitute scripted fakes.  The wire types here mirror the JSON
//! shapes of the engine's `/prompt`, `/queue`, and `/history` endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the engine client layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body did not match the expected shape.
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// /prompt response
// ---------------------------------------------------------------------------

/// Response from the engine's `/prompt` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Engine-assigned identifier for the queued job.
    pub prompt_id: String,
    /// Position counter in the execution queue.
    #[serde(default)]
    pub number: i64,
    /// Per-node validation errors.  Non-empty means the workflow was
    /// rejected even though the HTTP call succeeded.
    #[serde(default)]
    pub node_errors: HashMap<String, serde_json::Value>,
}

impl SubmitResponse {
    /// Whether the engine actually accepted the workflow.
    pub fn is_accepted(&self) -> bool {
        self.node_errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// /queue snapshot
// ---------------------------------------------------------------------------

/// Where a job currently sits in the engine's live queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobQueueState {
    /// Waiting; carries the 1-based position among pending jobs.
    Pending(usize),
    /// Currently executing.
    Running,
    /// Not present in either list.
    Absent,
}

/// Transient snapshot of the engine's queue, fetched once per poll cycle.
///
/// The engine encodes each queue entry as a heterogeneous array
/// `[number, prompt_id, prompt, ...]`; only the prompt id matters here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSnapshot {
    #[serde(rename = "queue_pending", default, deserialize_with = "queue_entry_ids")]
    pub pending: Vec<String>,
    #[serde(rename = "queue_running", default, deserialize_with = "queue_entry_ids")]
    pub running: Vec<String>,
}

impl QueueSnapshot {
    /// Build a snapshot from plain id lists (used by tests and fakes).
    pub fn from_ids(pending: Vec<String>, running: Vec<String>) -> Self {
        Self { pending, running }
    }

    /// Classify a job against this snapshot.
    pub fn state_of(&self, prompt_id: &str) -> JobQueueState {
        if let Some(idx) = self.pending.iter().position(|id| id == prompt_id) {
            // 0 is reserved for "executing", so pending positions are 1-based.
            return JobQueueState::Pending(idx + 1);
        }
        if self.running.iter().any(|id| id == prompt_id) {
            return JobQueueState::Running;
        }
        JobQueueState::Absent
    }
}

/// Extract prompt ids from the engine's `[number, prompt_id, ...]` entries.
fn queue_entry_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<Vec<serde_json::Value>> = Vec::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            entry
                .get(1)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .collect())
}

// ---------------------------------------------------------------------------
// /history entry
// ---------------------------------------------------------------------------

/// Reference to one artifact recorded in the engine's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRef {
    /// Engine-side filename of the artifact.
    pub filename: String,
    /// Engine-side subfolder, empty for the output root.
    #[serde(default)]
    pub subfolder: String,
}

/// Outputs recorded for a single workflow node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutputs {
    #[serde(default)]
    pub audio: Vec<OutputRef>,
    #[serde(default)]
    pub images: Vec<OutputRef>,
}

/// The engine's persisted record for one finished (or finishing) job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Recorded outputs keyed by node id.
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutputs>,
}

impl HistoryEntry {
    /// Whether any node has recorded at least one artifact.
    pub fn has_outputs(&self) -> bool {
        self.outputs
            .values()
            .any(|node| !node.audio.is_empty() || !node.images.is_empty())
    }

    /// First audio or image artifact found across all nodes.
    ///
    /// Audio arrays win over image arrays within a node; node order is
    /// unspecified, matching the engine's own dictionary semantics.
    pub fn first_output(&self) -> Option<&OutputRef> {
        self.outputs
            .values()
            .find_map(|node| node.audio.first().or_else(|| node.images.first()))
    }
}

// ---------------------------------------------------------------------------
// EngineApi trait
// ---------------------------------------------------------------------------

/// Operations the queue core needs from the workflow engine.
///
/// All methods are best modelled as single HTTP round-trips; retry and
/// timeout policy live in the callers (poller, retrieval, sweep).
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Submit a workflow in the engine's node/edge wire format.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, EngineApiError>;

    /// Fetch the live pending/running queue snapshot.
    async fn get_queue(&self) -> Result<QueueSnapshot, EngineApiError>;

    /// Fetch the persisted history entry for a job, if any.
    async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineApiError>;

    /// Interrupt whatever is currently executing.
    async fn interrupt(&self) -> Result<(), EngineApiError>;

    /// Remove a pending job from the engine's queue.
    async fn delete_from_queue(&self, prompt_id: &str) -> Result<(), EngineApiError>;

    /// Download a produced artifact by engine-side filename/subfolder.
    async fn download_file(
        &self,
        filename: &str,
        subfolder: &str,
    ) -> Result<Vec<u8>, EngineApiError>;

    /// Liveness probe; any successful response means the engine is up.
    async fn get_system_stats(&self) -> Result<serde_json::Value, EngineApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_snapshot_parses_engine_entry_arrays() {
        let raw = serde_json::json!({
            "queue_running": [[0, "run-1", {}]],
            "queue_pending": [[1, "pend-1", {}], [2, "pend-2", {}]],
        });
        let snapshot: QueueSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.running, vec!["run-1"]);
        assert_eq!(snapshot.pending, vec!["pend-1", "pend-2"]);
    }

    #[test]
    fn state_of_classifies_pending_running_absent() {
        let snapshot = QueueSnapshot::from_ids(
            vec!["a".into(), "b".into()],
            vec!["c".into()],
        );
        assert_eq!(snapshot.state_of("a"), JobQueueState::Pending(1));
        assert_eq!(snapshot.state_of("b"), JobQueueState::Pending(2));
        assert_eq!(snapshot.state_of("c"), JobQueueState::Running);
        assert_eq!(snapshot.state_of("z"), JobQueueState::Absent);
    }

    #[test]
    fn history_entry_finds_audio_before_images_within_a_node() {
        let raw = serde_json::json!({
            "outputs": {
                "9": {
                    "audio": [{"filename": "song.flac", "subfolder": "audio"}],
                    "images": [{"filename": "cover.png", "subfolder": ""}],
                }
            }
        });
        let entry: HistoryEntry = serde_json::from_value(raw).unwrap();
        assert!(entry.has_outputs());
        assert_eq!(entry.first_output().unwrap().filename, "song.flac");
    }

    #[test]
    fn history_entry_without_outputs_reports_none() {
        let raw = serde_json::json!({ "outputs": { "9": {} } });
        let entry: HistoryEntry = serde_json::from_value(raw).unwrap();
        assert!(!entry.has_outputs());
        assert!(entry.first_output().is_none());
    }

    #[test]
    fn submit_response_with_node_errors_is_rejected() {
        let raw = serde_json::json!({
            "prompt_id": "abc",
            "number": 3,
            "node_errors": { "4": { "errors": ["bad checkpoint"] } },
        });
        let response: SubmitResponse = serde_json::from_value(raw).unwrap();
        assert!(!response.is_accepted());
    }
}
