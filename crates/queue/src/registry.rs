//! In-memory task registry.
//!
//! A shared map from task id to [`GenerationTask`], owned by the queue
//! orchestrator.  All mutation goes through [`TaskRegistry::update`],
//! which reports the status before and after so the caller can publish
//! change notifications exactly once per real transition.  Lock critical
//! sections are short and never held across engine calls.

use std::collections::HashMap;

use tokio::sync::RwLock;

use genstudio_core::task::{GenerationTask, TaskStatus};
use genstudio_core::types::TaskId;

/// Concurrent task store.  Entries are created on enqueue and removed
/// only by [`remove_terminal`](Self::remove_terminal).
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, GenerationTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created task.
    pub async fn insert(&self, task: GenerationTask) {
        self.tasks.write().await.insert(task.id, task);
    }

    /// Snapshot of one task.
    pub async fn get(&self, id: TaskId) -> Option<GenerationTask> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Snapshot of all tasks, newest first.
    pub async fn all(&self) -> Vec<GenerationTask> {
        let mut tasks: Vec<_> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Ids and prompt ids of tasks the sweep should check (Queued or
    /// Processing with a prompt id recorded).
    pub async fn active(&self) -> Vec<(TaskId, String)> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status.is_active())
            .filter_map(|t| t.prompt_id.clone().map(|pid| (t.id, pid)))
            .collect()
    }

    /// Apply `f` to the task under the write lock.
    ///
    /// Returns the status the task had before the mutation plus a snapshot
    /// taken after it, or `None` if the id is unknown.
    pub async fn update<F>(&self, id: TaskId, f: F) -> Option<(TaskStatus, GenerationTask)>
    where
        F: FnOnce(&mut GenerationTask),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        let previous = task.status;
        f(task);
        Some((previous, task.clone()))
    }

    /// Remove every task in a terminal state; returns the removed ids.
    pub async fn remove_terminal(&self) -> Vec<TaskId> {
        let mut tasks = self.tasks.write().await;
        let ids: Vec<TaskId> = tasks
            .values()
            .filter(|t| t.status.is_terminal())
            .map(|t| t.id)
            .collect();
        for id in &ids {
            tasks.remove(id);
        }
        ids
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genstudio_core::generation::{AudioGenerationConfig, GenerationConfig};
    use genstudio_core::task::MediaKind;

    fn task(name: &str) -> GenerationTask {
        GenerationTask::new(
            name,
            MediaKind::Audio,
            GenerationConfig::Audio(AudioGenerationConfig::default()),
            None,
        )
    }

    #[tokio::test]
    async fn all_returns_newest_first() {
        let registry = TaskRegistry::new();
        let mut first = task("first");
        let mut second = task("second");
        // Force distinct, ordered creation times.
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        second.created_at = chrono::Utc::now();
        registry.insert(first).await;
        registry.insert(second).await;

        let all = registry.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "second");
        assert_eq!(all[1].name, "first");
    }

    #[tokio::test]
    async fn active_excludes_pending_and_terminal_tasks() {
        let registry = TaskRegistry::new();

        let pending = task("pending");
        let mut queued = task("queued");
        queued.mark_queued("q-1");
        let mut failed = task("failed");
        failed.mark_queued("f-1");
        failed.mark_failed("boom");

        registry.insert(pending).await;
        registry.insert(queued).await;
        registry.insert(failed).await;

        let active = registry.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].1, "q-1");
    }

    #[tokio::test]
    async fn update_reports_previous_status() {
        let registry = TaskRegistry::new();
        let t = task("t");
        let id = t.id;
        registry.insert(t).await;

        let (prev, after) = registry
            .update(id, |t| t.mark_queued("abc"))
            .await
            .unwrap();
        assert_eq!(prev, TaskStatus::Pending);
        assert_eq!(after.status, TaskStatus::Queued);

        assert!(registry.update(TaskId::new_v4(), |_| {}).await.is_none());
    }

    #[tokio::test]
    async fn remove_terminal_only_removes_terminal_tasks() {
        let registry = TaskRegistry::new();

        let mut done = task("done");
        done.mark_queued("d");
        done.mark_completed("/audio/a.flac");
        let mut cancelled = task("cancelled");
        cancelled.mark_cancelled();
        let live = task("live");
        let live_id = live.id;

        registry.insert(done).await;
        registry.insert(cancelled).await;
        registry.insert(live).await;

        let removed = registry.remove_terminal().await;
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(live_id).await.is_some());

        // A second pass finds nothing left to remove.
        assert!(registry.remove_terminal().await.is_empty());
    }
}
