//! Task routes: enqueue, list, inspect, cancel, and clear generation tasks.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use genstudio_core::error::CoreError;
use genstudio_core::generation::GenerationConfig;
use genstudio_core::task::GenerationTask;
use genstudio_core::types::TaskId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for creating a task.
///
/// The generation parameters are flattened alongside `name`/`notes`, with
/// the media kind selected by the `kind` field:
///
/// ```json
/// { "name": "Intro theme", "kind": "audio", "prompt": "warm synth pads" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub config: GenerationConfig,
}

/// Response payload for a cancel request.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Whether the task actually moved to `Cancelled`.
    pub cancelled: bool,
    /// Snapshot of the task after the cancel attempt.
    pub task: GenerationTask,
}

/// Response payload for clearing finished tasks.
#[derive(Debug, Serialize)]
pub struct ClearCompletedResponse {
    /// How many terminal tasks were removed.
    pub removed: usize,
}

/// POST /tasks -- create a task and submit it to the engine.
///
/// Always returns 201 with the created task; a failed submission surfaces
/// as a task in `Failed` status rather than an HTTP error.
async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationTask>>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Task name must not be empty".into()));
    }
    req.config.validate().map_err(AppError::Core)?;

    let id = state.queue.enqueue(req.name, req.config, req.notes).await;

    let task = state
        .queue
        .task(id)
        .await
        .ok_or_else(|| AppError::InternalError(format!("Task {id} vanished after enqueue")))?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: task })))
}

/// GET /tasks -- all tasks, newest first.
async fn list_tasks(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<GenerationTask>>> {
    let tasks = state.queue.all_tasks().await;
    Json(DataResponse { data: tasks })
}

/// GET /tasks/{id} -- one task by id.
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<Json<DataResponse<GenerationTask>>> {
    let task = state
        .queue
        .task(id)
        .await
        .ok_or(CoreError::NotFound { entity: "task", id })?;

    Ok(Json(DataResponse { data: task }))
}

/// POST /tasks/{id}/cancel -- request cancellation.
///
/// `cancelled: false` with a 200 means the task was already terminal;
/// an unknown id is a 404.
async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<Json<DataResponse<CancelResponse>>> {
    if state.queue.task(id).await.is_none() {
        return Err(CoreError::NotFound { entity: "task", id }.into());
    }

    let cancelled = state.queue.cancel(id).await;

    let task = state
        .queue
        .task(id)
        .await
        .ok_or(CoreError::NotFound { entity: "task", id })?;

    Ok(Json(DataResponse {
        data: CancelResponse { cancelled, task },
    }))
}

/// DELETE /tasks/completed -- remove all terminal tasks from the registry.
async fn clear_completed(
    State(state): State<AppState>,
) -> Json<DataResponse<ClearCompletedResponse>> {
    let removed = state.queue.clear_completed().await;
    Json(DataResponse {
        data: ClearCompletedResponse { removed },
    })
}

/// Mount task routes (intended to be nested under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/completed", delete(clear_completed))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}
