//! Queue orchestrator façade and background sweep.
//!
//! [`GenerationQueue`] is the single entry point for the HTTP/UI layers:
//! it creates tasks, submits them to the engine, and owns the supervised
//! periodic sweep that walks every active task through a completion check.
//! One task's failure never aborts another's check, and every real status
//! change is published to the event bus exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use genstudio_comfyui::engine::EngineApi;
use genstudio_comfyui::poller::{poll_once, CompletionPoller, PollConfig, PollOutcome};
use genstudio_comfyui::retrieval::{FileRetriever, OutputDir, RetrievalConfig};
use genstudio_core::generation::GenerationConfig;
use genstudio_core::task::{GenerationTask, TaskStatus};
use genstudio_core::types::TaskId;
use genstudio_events::{QueueEvent, QueueEventBus};

use crate::registry::TaskRegistry;
use crate::submit::Submitter;

/// How long shutdown waits for the sweep task to exit cleanly.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunable parameters for the queue orchestrator.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Delay before the first sweep tick.
    pub sweep_initial_delay: Duration,
    /// Period between sweep ticks.
    pub sweep_interval: Duration,
    /// Polling parameters for explicit completion waits.
    pub poll: PollConfig,
    /// History-lookup retry parameters for artifact retrieval.
    pub retrieval: RetrievalConfig,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            sweep_initial_delay: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(15),
            poll: PollConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// The generation queue: task façade plus background sweep lifecycle.
///
/// Created once per process via [`GenerationQueue::start`]; the returned
/// `Arc` is cheap to clone into request handlers.
pub struct GenerationQueue {
    registry: TaskRegistry,
    engine: Arc<dyn EngineApi>,
    submitter: Submitter,
    retriever: FileRetriever,
    poller: CompletionPoller,
    events: Arc<QueueEventBus>,
    settings: QueueSettings,
    /// Cancelled during shutdown; children guard the poll/retry sleeps.
    cancel: CancellationToken,
    sweep_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GenerationQueue {
    /// Create the queue and start its background sweep.
    pub fn start(
        engine: Arc<dyn EngineApi>,
        output: OutputDir,
        events: Arc<QueueEventBus>,
        settings: QueueSettings,
    ) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let queue = Arc::new(Self {
            registry: TaskRegistry::new(),
            submitter: Submitter::new(Arc::clone(&engine)),
            retriever: FileRetriever::new(
                Arc::clone(&engine),
                output,
                settings.retrieval.clone(),
            ),
            poller: CompletionPoller::new(Arc::clone(&engine), settings.poll.clone()),
            engine,
            events,
            settings,
            cancel,
            sweep_handle: Mutex::new(None),
        });

        let sweeper = Arc::clone(&queue);
        let handle = tokio::spawn(async move { sweeper.run_sweep().await });
        // The lock is uncontended here; the sweep task never takes it.
        *queue.sweep_handle.try_lock().expect("fresh queue") = Some(handle);

        queue
    }

    /// Subscribe to task lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Create a task and submit it to the engine.
    ///
    /// Submission is awaited before returning, so the task id handed back
    /// refers to a task that is already `Queued` or `Failed` -- callers
    /// inspect the status to learn the outcome.  No error channel exists
    /// past this point; failures surface via the task itself.
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        config: GenerationConfig,
        notes: Option<String>,
    ) -> TaskId {
        let kind = config.kind();
        let task = GenerationTask::new(name, kind, config.clone(), notes);
        let id = task.id;
        self.registry.insert(task).await;

        tracing::info!(task_id = %id, %kind, "Task created, submitting workflow");

        match self.submitter.submit(&config).await {
            Ok(prompt_id) => {
                self.apply(id, |t| t.mark_queued(prompt_id)).await;
            }
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "Submission failed");
                self.apply(id, |t| t.mark_failed(format!("Submission failed: {e}")))
                    .await;
            }
        }

        id
    }

    /// Snapshot of one task.
    pub async fn task(&self, id: TaskId) -> Option<GenerationTask> {
        self.registry.get(id).await
    }

    /// All tasks, newest first.
    pub async fn all_tasks(&self) -> Vec<GenerationTask> {
        self.registry.all().await
    }

    /// Cancel a task.
    ///
    /// Returns `false` if the task is unknown or already terminal.  The
    /// remote cancel (queue delete, plus interrupt when executing) is
    /// best-effort: its failure is logged but never blocks the local
    /// transition.
    pub async fn cancel(&self, id: TaskId) -> bool {
        let Some(task) = self.registry.get(id).await else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }

        if let Some(prompt_id) = &task.prompt_id {
            if let Err(e) = self.engine.delete_from_queue(prompt_id).await {
                tracing::warn!(task_id = %id, error = %e, "Remote queue delete failed");
            }
            if task.status == TaskStatus::Processing {
                if let Err(e) = self.engine.interrupt().await {
                    tracing::warn!(task_id = %id, error = %e, "Remote interrupt failed");
                }
            }
        }

        // Re-check terminality under the write lock: a sweep tick may have
        // completed the task while the remote cancel was in flight.
        let result = self
            .apply(id, |t| {
                if !t.status.is_terminal() {
                    t.mark_cancelled();
                }
            })
            .await;

        match result {
            Some((previous, _)) if !previous.is_terminal() => {
                tracing::info!(task_id = %id, "Task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Remove all terminal tasks; returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let removed = self.registry.remove_terminal().await;
        let count = removed.len();
        if count > 0 {
            tracing::info!(count, "Cleared terminal tasks");
            self.events
                .publish(QueueEvent::TasksCleared { task_ids: removed });
        }
        count
    }

    /// Block until the task's job completes on the engine, or the
    /// configured poll timeout elapses.  Intended for callers that need
    /// synchronous results; the sweep still performs the actual state
    /// transition and download.  Returns `false` for unknown tasks and
    /// tasks that never reached the engine.
    pub async fn wait_for_task(&self, id: TaskId) -> bool {
        let Some(task) = self.registry.get(id).await else {
            return false;
        };
        let Some(prompt_id) = task.prompt_id else {
            return false;
        };
        self.poller
            .wait_for_completion(&prompt_id, self.settings.poll.timeout, &self.cancel)
            .await
    }

    /// Stop the background sweep and abandon in-flight checks.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down generation queue");
        self.cancel.cancel();

        if let Some(handle) = self.sweep_handle.lock().await.take() {
            if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                tracing::warn!("Sweep task did not stop within the join timeout");
            }
        }

        tracing::info!("Generation queue shut down");
    }

    // -----------------------------------------------------------------------
    // Background sweep
    // -----------------------------------------------------------------------

    /// Periodic sweep driver; runs until the cancellation token fires.
    async fn run_sweep(&self) {
        let start = tokio::time::Instant::now() + self.settings.sweep_initial_delay;
        let mut ticker = tokio::time::interval_at(start, self.settings.sweep_interval);
        tracing::info!(
            interval_ms = self.settings.sweep_interval.as_millis() as u64,
            "Background sweep started",
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Background sweep shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_tick().await;
                }
            }
        }
    }

    /// One sweep pass over every active task.
    ///
    /// Checks run concurrently and are individually contained -- a failed
    /// check marks (at most) its own task and never aborts the tick.
    pub async fn sweep_tick(&self) {
        let active = self.registry.active().await;
        if active.is_empty() {
            return;
        }

        tracing::debug!(count = active.len(), "Sweep tick");
        let checks = active
            .into_iter()
            .map(|(id, prompt_id)| self.check_task(id, prompt_id));
        futures::future::join_all(checks).await;
    }

    /// Completion check for a single task.
    async fn check_task(&self, id: TaskId, prompt_id: String) {
        // Skip tasks cancelled (or otherwise finished) since the snapshot.
        let Some(task) = self.registry.get(id).await else {
            return;
        };
        if !task.status.is_active() {
            return;
        }

        let outcome = match poll_once(self.engine.as_ref(), &prompt_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Transient engine error; this task is retried next tick.
                tracing::warn!(task_id = %id, error = %e, "Completion check failed, will retry");
                return;
            }
        };

        match outcome {
            PollOutcome::Pending(position) => {
                self.apply(id, |t| {
                    if t.status == TaskStatus::Processing {
                        // Defensive: the engine re-queued the job.
                        t.mark_requeued(position);
                    } else {
                        t.queue_position = Some(position);
                    }
                })
                .await;
            }
            PollOutcome::Running => {
                self.apply(id, |t| {
                    if t.status != TaskStatus::Processing {
                        t.mark_processing();
                    }
                })
                .await;
            }
            PollOutcome::Finished | PollOutcome::Finishing | PollOutcome::Unknown => {
                // Gone from the live queue: try to fetch the artifact.
                self.finalize_task(id, &prompt_id, task).await;
            }
        }
    }

    /// The job has left the engine's queue; download its artifact and
    /// complete the task, or record why that could not happen.
    async fn finalize_task(&self, id: TaskId, prompt_id: &str, task: GenerationTask) {
        match self
            .retriever
            .get_generated_file(prompt_id, task.kind, &self.cancel)
            .await
        {
            Ok(Some(path)) => {
                self.apply(id, |t| t.mark_completed(path)).await;
            }
            Ok(None) => {
                // Not ready yet: stay in the current status and let the
                // next tick retry.  The job has left the engine's queue,
                // so any recorded position is stale; status is unchanged,
                // so this fires no event.
                self.apply(id, |t| t.queue_position = None).await;
                tracing::debug!(
                    task_id = %id,
                    prompt_id,
                    "Output not available yet, retrying next sweep",
                );
            }
            Err(e) => {
                tracing::error!(task_id = %id, prompt_id, error = %e, "Artifact retrieval failed");
                self.apply(id, |t| t.mark_failed(e.to_string())).await;
            }
        }
    }

    /// Mutate a task and publish a change event iff its status changed.
    async fn apply<F>(&self, id: TaskId, f: F) -> Option<(TaskStatus, GenerationTask)>
    where
        F: FnOnce(&mut GenerationTask),
    {
        let result = self.registry.update(id, f).await;
        if let Some((previous, task)) = &result {
            if *previous != task.status {
                tracing::info!(
                    task_id = %id,
                    from = ?previous,
                    to = ?task.status,
                    "Task status changed",
                );
                self.events
                    .publish(QueueEvent::TaskStatusChanged { task: task.clone() });
            }
        }
        result
    }
}
