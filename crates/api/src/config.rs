use std::path::PathBuf;
use std::time::Duration;

use genstudio_comfyui::poller::PollConfig;
use genstudio_comfyui::retrieval::RetrievalConfig;
use genstudio_queue::QueueSettings;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Base URL of the ComfyUI engine (default: `http://127.0.0.1:8188`).
    pub comfyui_url: String,
    /// Directory where generated artifacts are written and served from.
    pub output_dir: PathBuf,
    /// Delay before the first background sweep tick, in seconds (default: `5`).
    pub sweep_initial_delay_secs: u64,
    /// Period between background sweep ticks, in seconds (default: `15`).
    pub sweep_interval_secs: u64,
    /// Interval between completion polls, in seconds (default: `3`).
    pub poll_interval_secs: u64,
    /// Overall timeout for explicit completion waits, in seconds (default: `600`).
    pub poll_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `COMFYUI_URL`             | `http://127.0.0.1:8188` |
    /// | `OUTPUT_DIR`              | `./output`              |
    /// | `SWEEP_INITIAL_DELAY_SECS`| `5`                     |
    /// | `SWEEP_INTERVAL_SECS`     | `15`                    |
    /// | `POLL_INTERVAL_SECS`      | `3`                     |
    /// | `POLL_TIMEOUT_SECS`       | `600`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 30);

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let output_dir = PathBuf::from(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".into()),
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            comfyui_url,
            output_dir,
            sweep_initial_delay_secs: env_u64("SWEEP_INITIAL_DELAY_SECS", 5),
            sweep_interval_secs: env_u64("SWEEP_INTERVAL_SECS", 15),
            poll_interval_secs: env_u64("POLL_INTERVAL_SECS", 3),
            poll_timeout_secs: env_u64("POLL_TIMEOUT_SECS", 600),
        }
    }

    /// Translate the sweep/poll sections into queue orchestrator settings.
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            sweep_initial_delay: Duration::from_secs(self.sweep_initial_delay_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            poll: PollConfig {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
            retrieval: RetrievalConfig::default(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
}
