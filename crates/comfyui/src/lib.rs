//! ComfyUI engine integration for genstudio.
//!
//! Provides the [`engine::EngineApi`] trait abstracting the engine's REST
//! surface, the [`api::ComfyUIApi`] HTTP implementation, per-kind workflow
//! graph builders, the completion poller, and artifact retrieval.

pub mod api;
pub mod engine;
pub mod poller;
pub mod retrieval;
pub mod workflow;
