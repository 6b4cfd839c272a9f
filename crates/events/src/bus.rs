//! Event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`QueueEventBus`] is the publish/subscribe hub for [`QueueEvent`]s.  It
//! is shared via `Arc<QueueEventBus>`; the queue orchestrator publishes,
//! the HTTP/UI layers subscribe.  Every real task status change produces
//! exactly one `TaskStatusChanged` event carrying the full updated task.

use serde::Serialize;
use tokio::sync::broadcast;

use genstudio_core::task::GenerationTask;
use genstudio_core::types::TaskId;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// A lifecycle event originating from the generation queue.
#[derive(Debug, Clone, Serialize)]
pub enum QueueEvent {
    /// A task's status changed.  Carries a snapshot of the whole task as
    /// it looked immediately after the transition.
    TaskStatusChanged { task: GenerationTask },

    /// Terminal tasks were removed by an explicit clear operation.
    TasksCleared { task_ids: Vec<TaskId> },
}

/// In-process fan-out bus for [`QueueEvent`]s.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published event.  Slow receivers observe a
/// `RecvError::Lagged` when the buffer wraps.
pub struct QueueEventBus {
    sender: broadcast::Sender<QueueEvent>,
}

impl QueueEventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// A send error only means there are zero receivers, so it is ignored.
    pub fn publish(&self, event: QueueEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers (used in tests and diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for QueueEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
