//! In-process event bus for queue lifecycle notifications.

pub mod bus;

pub use bus::{QueueEvent, QueueEventBus};
