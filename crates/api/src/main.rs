use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genstudio_api::config::ServerConfig;
use genstudio_api::{routes, state};
use genstudio_comfyui::api::ComfyUIApi;
use genstudio_comfyui::engine::EngineApi;
use genstudio_comfyui::retrieval::OutputDir;
use genstudio_events::{QueueEvent, QueueEventBus};
use genstudio_queue::GenerationQueue;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genstudio_api=debug,genstudio_queue=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, engine = %config.comfyui_url, "Loaded server configuration");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Engine client ---
    let engine: Arc<dyn EngineApi> = Arc::new(ComfyUIApi::new(&config.comfyui_url));

    // --- Event bus ---
    let event_bus = Arc::new(QueueEventBus::default());

    // Spawn the event logger (traces every lifecycle notification).
    let logger_handle = tokio::spawn(log_queue_events(event_bus.subscribe()));

    // --- Generation queue ---
    let queue = GenerationQueue::start(
        Arc::clone(&engine),
        OutputDir::new(&config.output_dir),
        Arc::clone(&event_bus),
        config.queue_settings(),
    );
    tracing::info!(output_dir = %config.output_dir.display(), "Generation queue started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        queue: Arc::clone(&queue),
        engine,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // Generated artifacts, served straight from the output directory.
        .fallback_service(ServeDir::new(&config.output_dir))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the queue first (it may have an in-flight sweep).
    queue.shutdown().await;
    tracing::info!("Generation queue shut down");

    // Drop the event bus sender to close the broadcast channel.
    // This signals the event logger to shut down.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Event logger stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Consume lifecycle events and log them until the bus closes.
async fn log_queue_events(mut rx: tokio::sync::broadcast::Receiver<QueueEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match rx.recv().await {
            Ok(QueueEvent::TaskStatusChanged { task }) => {
                tracing::info!(task_id = %task.id, status = %task.status, "Task status changed");
            }
            Ok(QueueEvent::TasksCleared { task_ids }) => {
                tracing::info!(count = task_ids.len(), "Finished tasks cleared");
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event logger lagged behind the bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
