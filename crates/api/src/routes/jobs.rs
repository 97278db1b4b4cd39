//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                  -> list_jobs
/// GET    /{id}              -> get_job
/// DELETE /{id}              -> delete_job
/// GET    /{id}/status       -> get_job_status
/// GET    /{id}/logs         -> get_job_logs
/// GET    /{id}/logs/stream  -> job_logs_ws (WebSocket)
/// POST   /{id}/cancel       -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/status", get(jobs::get_job_status))
        .route("/{id}/logs", get(jobs::get_job_logs))
        .route("/{id}/logs/stream", get(ws::job_logs_ws))
        .route("/{id}/cancel", post(jobs::cancel_job))
}
