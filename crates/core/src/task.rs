//! Generation task model and lifecycle state machine.
//!
//! A [`GenerationTask`] tracks one media-generation job from creation
//! through submission to the engine, background completion checks, and a
//! terminal state.  All transitions go through the `mark_*` methods so the
//! field invariants (prompt id set iff at-or-past Queued, file path set iff
//! Completed, completion timestamp set iff terminal) hold by construction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generation::GenerationConfig;
use crate::types::{TaskId, Timestamp};

// ---------------------------------------------------------------------------
// Media kind
// ---------------------------------------------------------------------------

/// The kind of media a task produces.  Selects the workflow builder, the
/// output subfolder, and the fallback artifact extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
    Video,
}

impl MediaKind {
    /// Stable lowercase name, used in logs and file naming.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Web-root-relative directory the downloaded artifact lands in.
    pub fn output_subfolder(&self) -> &'static str {
        self.as_str()
    }

    /// Prefix for generated artifact filenames.
    pub fn file_prefix(&self) -> &'static str {
        self.as_str()
    }

    /// Extension used when the engine-side filename carries none.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "flac",
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Lifecycle state of a generation task.
///
/// `Pending -> Queued -> Processing -> {Completed | Failed}`, with
/// `Cancelled` reachable from any non-terminal state.  The engine may also
/// push a task back from `Processing` to `Queued` (re-queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created locally, not yet submitted to the engine.
    Pending,
    /// Accepted by the engine, waiting in its queue.
    Queued,
    /// Currently executing on the engine.
    Processing,
    /// Artifact downloaded and persisted locally.
    Completed,
    /// Submission, execution, or download failed.
    Failed,
    /// Cancelled by user action.
    Cancelled,
}

impl TaskStatus {
    /// Terminal states are never left and are eligible for clearing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Active states are the ones the background sweep checks.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Processing)
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GenerationTask
// ---------------------------------------------------------------------------

/// One unit of generation work.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTask {
    /// Unique id, assigned at creation, immutable.
    pub id: TaskId,
    /// Human-readable label.
    pub name: String,
    /// Media kind; immutable after creation.
    pub kind: MediaKind,
    /// Kind-specific generation parameters.
    pub config: GenerationConfig,
    /// Optional free-form notes supplied at enqueue time.
    pub notes: Option<String>,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Engine-assigned job id; set once on successful submission.
    pub prompt_id: Option<String>,
    /// 0 = currently executing, >0 = position in the engine's pending queue.
    pub queue_position: Option<usize>,
    /// Web-relative path to the downloaded artifact; set only on Completed.
    pub generated_file_path: Option<String>,
    /// Failure reason; set on Failed and Cancelled.
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    /// When the engine accepted the submission.
    pub submitted_at: Option<Timestamp>,
    /// When the task reached a terminal state.
    pub completed_at: Option<Timestamp>,
}

impl GenerationTask {
    /// Create a new task in `Pending`.
    pub fn new(
        name: impl Into<String>,
        kind: MediaKind,
        config: GenerationConfig,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            config,
            notes,
            status: TaskStatus::Pending,
            prompt_id: None,
            queue_position: None,
            generated_file_path: None,
            error_message: None,
            created_at: Utc::now(),
            submitted_at: None,
            completed_at: None,
        }
    }

    /// Record a successful engine submission: `Pending -> Queued`.
    pub fn mark_queued(&mut self, prompt_id: impl Into<String>) {
        self.status = TaskStatus::Queued;
        self.prompt_id = Some(prompt_id.into());
        self.submitted_at = Some(Utc::now());
    }

    /// Sweep observed the job in the engine's executing list.
    pub fn mark_processing(&mut self) {
        self.status = TaskStatus::Processing;
        self.queue_position = Some(0);
    }

    /// Sweep observed the job back in the pending list (engine re-queued
    /// it).  Not expected in normal operation, but handled.
    pub fn mark_requeued(&mut self, position: usize) {
        self.status = TaskStatus::Queued;
        self.queue_position = Some(position);
    }

    /// Artifact downloaded: terminal `Completed`.
    pub fn mark_completed(&mut self, file_path: impl Into<String>) {
        self.status = TaskStatus::Completed;
        self.generated_file_path = Some(file_path.into());
        self.queue_position = None;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal `Failed` with a human-readable reason.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.queue_position = None;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal `Cancelled` by user action.
    pub fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.error_message = Some("Cancelled by user".to_string());
        self.queue_position = None;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::AudioGenerationConfig;

    fn audio_task() -> GenerationTask {
        GenerationTask::new(
            "test",
            MediaKind::Audio,
            GenerationConfig::Audio(AudioGenerationConfig::default()),
            None,
        )
    }

    #[test]
    fn new_task_is_pending_with_no_prompt_id() {
        let task = audio_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.prompt_id.is_none());
        assert!(task.generated_file_path.is_none());
        assert!(task.submitted_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn mark_queued_sets_prompt_id_and_submitted_at() {
        let mut task = audio_task();
        task.mark_queued("abc-123");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.prompt_id.as_deref(), Some("abc-123"));
        assert!(task.submitted_at.is_some());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn mark_completed_sets_path_and_clears_queue_position() {
        let mut task = audio_task();
        task.mark_queued("abc");
        task.mark_processing();
        assert_eq!(task.queue_position, Some(0));

        task.mark_completed("/audio/audio_abc_20250101000000.flac");
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.queue_position.is_none());
        assert!(task.completed_at.is_some());
        assert!(task.generated_file_path.is_some());
    }

    #[test]
    fn mark_cancelled_records_reason() {
        let mut task = audio_task();
        task.mark_queued("abc");
        task.mark_cancelled();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.error_message.as_deref(), Some("Cancelled by user"));
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn requeue_is_reachable_from_processing() {
        let mut task = audio_task();
        task.mark_queued("abc");
        task.mark_processing();
        task.mark_requeued(2);
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.queue_position, Some(2));
    }

    #[test]
    fn terminal_and_active_classification() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Queued.is_active());
        assert!(TaskStatus::Processing.is_active());
        assert!(!TaskStatus::Pending.is_active());
        assert!(!TaskStatus::Completed.is_active());
    }
}
