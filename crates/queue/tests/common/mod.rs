//! Shared test doubles for queue integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use genstudio_comfyui::engine::{
    EngineApi, EngineApiError, HistoryEntry, NodeOutputs, OutputRef, QueueSnapshot, SubmitResponse,
};
use genstudio_comfyui::retrieval::OutputDir;

/// How the fake engine answers `/prompt` submissions.
pub enum SubmitBehavior {
    /// Accept with sequential prompt ids: `{prefix}`, `{prefix}-2`, ...
    Accept { prefix: String },
    /// Accept the HTTP call but report node validation errors.
    RejectNodes,
    /// Fail the HTTP call outright.
    Error,
}

/// Scripted in-memory engine.
///
/// The queue snapshot is a piece of mutable "current state" the test
/// updates between sweep ticks; history entries are keyed by prompt id
/// and set explicitly by each test.
pub struct FakeEngine {
    submit: SubmitBehavior,
    submit_count: AtomicU32,
    queue_state: Mutex<QueueSnapshot>,
    history: Mutex<HashMap<String, HistoryEntry>>,
    pub fail_remote_cancel: AtomicBool,
    /// When set, the next `get_queue` call fails once, then recovers.
    pub fail_next_queue: AtomicBool,
    pub deletes: Mutex<Vec<String>>,
    pub interrupts: AtomicU32,
}

impl FakeEngine {
    pub fn accepting(prefix: &str) -> Arc<Self> {
        Self::with_submit(SubmitBehavior::Accept {
            prefix: prefix.to_string(),
        })
    }

    pub fn with_submit(behavior: SubmitBehavior) -> Arc<Self> {
        Arc::new(Self {
            submit: behavior,
            submit_count: AtomicU32::new(0),
            queue_state: Mutex::new(QueueSnapshot::default()),
            history: Mutex::new(HashMap::new()),
            fail_remote_cancel: AtomicBool::new(false),
            fail_next_queue: AtomicBool::new(false),
            deletes: Mutex::new(Vec::new()),
            interrupts: AtomicU32::new(0),
        })
    }

    /// Replace the engine's current queue snapshot.
    pub fn set_queue_state(&self, pending: &[&str], running: &[&str]) {
        *self.queue_state.lock().unwrap() = QueueSnapshot::from_ids(
            pending.iter().map(|s| s.to_string()).collect(),
            running.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Record a history entry with a single audio output.
    pub fn set_audio_output(&self, prompt_id: &str, filename: &str) {
        let mut entry = HistoryEntry::default();
        entry.outputs.insert(
            "9".to_string(),
            NodeOutputs {
                audio: vec![OutputRef {
                    filename: filename.to_string(),
                    subfolder: String::new(),
                }],
                images: vec![],
            },
        );
        self.history.lock().unwrap().insert(prompt_id.to_string(), entry);
    }
}

#[async_trait]
impl EngineApi for FakeEngine {
    async fn submit_workflow(
        &self,
        _workflow: &serde_json::Value,
        _client_id: &str,
    ) -> Result<SubmitResponse, EngineApiError> {
        let n = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.submit {
            SubmitBehavior::Accept { prefix } => {
                let prompt_id = if n == 1 {
                    prefix.clone()
                } else {
                    format!("{prefix}-{n}")
                };
                Ok(SubmitResponse {
                    prompt_id,
                    number: n as i64,
                    node_errors: HashMap::new(),
                })
            }
            SubmitBehavior::RejectNodes => {
                let mut node_errors = HashMap::new();
                node_errors.insert(
                    "4".to_string(),
                    serde_json::json!({ "errors": ["value not in list: ckpt_name"] }),
                );
                Ok(SubmitResponse {
                    prompt_id: String::new(),
                    number: 0,
                    node_errors,
                })
            }
            SubmitBehavior::Error => Err(EngineApiError::ApiError {
                status: 500,
                body: "engine down".into(),
            }),
        }
    }

    async fn get_queue(&self) -> Result<QueueSnapshot, EngineApiError> {
        if self.fail_next_queue.swap(false, Ordering::SeqCst) {
            return Err(EngineApiError::ApiError {
                status: 502,
                body: "queue snapshot unavailable".into(),
            });
        }
        Ok(self.queue_state.lock().unwrap().clone())
    }

    async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineApiError> {
        Ok(self.history.lock().unwrap().get(prompt_id).cloned())
    }

    async fn interrupt(&self) -> Result<(), EngineApiError> {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        if self.fail_remote_cancel.load(Ordering::SeqCst) {
            return Err(EngineApiError::ApiError {
                status: 500,
                body: "interrupt failed".into(),
            });
        }
        Ok(())
    }

    async fn delete_from_queue(&self, prompt_id: &str) -> Result<(), EngineApiError> {
        if self.fail_remote_cancel.load(Ordering::SeqCst) {
            return Err(EngineApiError::ApiError {
                status: 500,
                body: "delete failed".into(),
            });
        }
        self.deletes.lock().unwrap().push(prompt_id.to_string());
        Ok(())
    }

    async fn download_file(
        &self,
        _filename: &str,
        _subfolder: &str,
    ) -> Result<Vec<u8>, EngineApiError> {
        Ok(b"fake-artifact".to_vec())
    }

    async fn get_system_stats(&self) -> Result<serde_json::Value, EngineApiError> {
        Ok(serde_json::json!({ "system": { "os": "fake" } }))
    }
}

/// Unique temp directory for artifact writes.
pub fn temp_output_dir() -> OutputDir {
    OutputDir::new(
        std::env::temp_dir().join(format!("genstudio-queue-test-{}", uuid::Uuid::new_v4())),
    )
}
