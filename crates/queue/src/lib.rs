//! Generation queue orchestration.
//!
//! The [`orchestrator::GenerationQueue`] façade accepts generation
//! requests, submits them to the engine via the kind-dispatched
//! [`submit::Submitter`], tracks them in the in-memory
//! [`registry::TaskRegistry`], and drives a supervised background sweep
//! that moves tasks through their lifecycle and downloads finished
//! artifacts.

pub mod orchestrator;
pub mod registry;
pub mod submit;

pub use orchestrator::{GenerationQueue, QueueSettings};
