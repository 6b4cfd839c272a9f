use std::sync::Arc;

use genstudio_comfyui::engine::EngineApi;
use genstudio_queue::GenerationQueue;

use crate::config::ServerConfig;

/// Shared application state injected into every handler.
///
/// All fields are cheaply cloneable; axum clones the whole struct per
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (immutable after startup).
    pub config: Arc<ServerConfig>,
    /// The generation queue façade.
    pub queue: Arc<GenerationQueue>,
    /// Direct engine handle, used by the health check.
    pub engine: Arc<dyn EngineApi>,
}
