use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use genstudio_api::config::ServerConfig;
use genstudio_api::routes;
use genstudio_api::state::AppState;
use genstudio_comfyui::engine::{
    EngineApi, EngineApiError, HistoryEntry, QueueSnapshot, SubmitResponse,
};
use genstudio_comfyui::retrieval::OutputDir;
use genstudio_events::QueueEventBus;
use genstudio_queue::{GenerationQueue, QueueSettings};

/// Engine stub used by the HTTP tests.
///
/// Accepts every submission with a fixed prompt id and reports an empty
/// queue; the goal here is exercising routing, extraction, and response
/// shapes, not the lifecycle sweep (the queue crate covers that).
pub struct StubEngine {
    /// When set, system stats calls fail, flipping health to degraded.
    pub stats_down: AtomicBool,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            stats_down: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EngineApi for StubEngine {
    async fn submit_workflow(
        &self,
        _workflow: &serde_json::Value,
        _client_id: &str,
    ) -> Result<SubmitResponse, EngineApiError> {
        Ok(SubmitResponse {
            prompt_id: "stub-prompt".to_string(),
            number: 1,
            node_errors: Default::default(),
        })
    }

    async fn get_queue(&self) -> Result<QueueSnapshot, EngineApiError> {
        Ok(QueueSnapshot::from_ids(vec![], vec![]))
    }

    async fn get_history(&self, _prompt_id: &str) -> Result<Option<HistoryEntry>, EngineApiError> {
        Ok(None)
    }

    async fn interrupt(&self) -> Result<(), EngineApiError> {
        Ok(())
    }

    async fn delete_from_queue(&self, _prompt_id: &str) -> Result<(), EngineApiError> {
        Ok(())
    }

    async fn download_file(
        &self,
        _filename: &str,
        _subfolder: &str,
    ) -> Result<Vec<u8>, EngineApiError> {
        Ok(vec![])
    }

    async fn get_system_stats(&self) -> Result<serde_json::Value, EngineApiError> {
        if self.stats_down.load(Ordering::SeqCst) {
            return Err(EngineApiError::ApiError {
                status: 500,
                body: "engine down".to_string(),
            });
        }
        Ok(serde_json::json!({ "system": { "os": "test" } }))
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        comfyui_url: "http://127.0.0.1:8188".to_string(),
        output_dir: std::env::temp_dir().join("genstudio-api-test"),
        sweep_initial_delay_secs: 3600,
        sweep_interval_secs: 3600,
        poll_interval_secs: 3,
        poll_timeout_secs: 600,
    }
}

/// Build the full application router with all middleware layers, backed by
/// the given engine stub.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(engine: Arc<StubEngine>) -> Router {
    let config = test_config();
    let engine: Arc<dyn EngineApi> = engine;

    let queue = GenerationQueue::start(
        Arc::clone(&engine),
        OutputDir::new(&config.output_dir),
        Arc::new(QueueEventBus::default()),
        QueueSettings {
            sweep_initial_delay: Duration::from_secs(config.sweep_initial_delay_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            ..QueueSettings::default()
        },
    );

    let state = AppState {
        config: Arc::new(config),
        queue,
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a DELETE request against the app.
pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body into parsed JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
