//! Completion polling against the engine's queue and history.
//!
//! The engine offers no push channel here, so completion is detected by
//! polling: each cycle checks the live queue snapshot, and only when the
//! job has left both lists does it consult the persisted history to
//! distinguish "finished" from "not registered yet".  Transient errors in
//! a single cycle are logged and absorbed; only the overall timeout fails
//! the wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineApi, EngineApiError, JobQueueState};

/// Tunable parameters for the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between poll cycles.
    pub interval: Duration,
    /// Default overall budget for one wait call.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(600),
        }
    }
}

/// What one poll cycle learned about a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still waiting in the engine queue, with its 1-based position.
    Pending(usize),
    /// Currently executing.
    Running,
    /// In history with at least one recorded output: done.
    Finished,
    /// In history but outputs not recorded yet (file still being written).
    Finishing,
    /// Absent from queue and history; may not have registered yet.
    Unknown,
}

/// Run a single poll cycle for `prompt_id`.
///
/// Queue snapshot first; history only when the job is absent from both
/// queue lists.
pub async fn poll_once(
    engine: &dyn EngineApi,
    prompt_id: &str,
) -> Result<PollOutcome, EngineApiError> {
    let queue = engine.get_queue().await?;
    match queue.state_of(prompt_id) {
        JobQueueState::Pending(position) => Ok(PollOutcome::Pending(position)),
        JobQueueState::Running => Ok(PollOutcome::Running),
        JobQueueState::Absent => match engine.get_history(prompt_id).await? {
            Some(entry) if entry.has_outputs() => Ok(PollOutcome::Finished),
            Some(_) => Ok(PollOutcome::Finishing),
            None => Ok(PollOutcome::Unknown),
        },
    }
}

/// Blocking completion wait over [`poll_once`].
pub struct CompletionPoller {
    engine: Arc<dyn EngineApi>,
    config: PollConfig,
}

impl CompletionPoller {
    pub fn new(engine: Arc<dyn EngineApi>, config: PollConfig) -> Self {
        Self { engine, config }
    }

    /// Poll until the job completes, `timeout` elapses, or `cancel` fires.
    ///
    /// Returns `true` as soon as a cycle observes the job finished with
    /// outputs.  Transient per-cycle errors are logged at warn level and
    /// polling continues.  Returns `false` on timeout (with elapsed time
    /// and poll count logged) or cancellation.
    pub async fn wait_for_completion(
        &self,
        prompt_id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            match poll_once(self.engine.as_ref(), prompt_id).await {
                Ok(PollOutcome::Finished) => {
                    tracing::info!(
                        prompt_id,
                        polls,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Job completed",
                    );
                    return true;
                }
                Ok(outcome) => {
                    tracing::debug!(prompt_id, ?outcome, polls, "Job not finished yet");
                }
                Err(e) => {
                    // A single failed cycle is transient; the timeout is
                    // the only hard stop.
                    tracing::warn!(prompt_id, error = %e, "Poll cycle failed, continuing");
                }
            }

            if start.elapsed() >= timeout {
                tracing::warn!(
                    prompt_id,
                    polls,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Completion wait timed out",
                );
                return false;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(prompt_id, "Completion wait cancelled");
                    return false;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

}
