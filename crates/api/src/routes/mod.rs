pub mod health;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// All API v1 routes (intended to be nested under `/api/v1`).
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(tasks::router())
}
