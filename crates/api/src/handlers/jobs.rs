//! Handlers for the `/jobs` resource.
//!
//! Read-side endpoints plus cancellation and deletion. The log *stream*
//! lives in [`crate::ws::logs`]; the REST endpoint here returns a snapshot.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use segtrain_core::job::{JobStatus, JobStatusView};
use segtrain_core::types::JobId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters accepted by the job list endpoint.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Restrict the listing to jobs in this status.
    pub status: Option<JobStatus>,
}

/// Query parameters accepted by the log snapshot endpoint.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Return only the most recent N lines.
    pub tail: Option<usize>,
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List all jobs, newest first, optionally filtered by `?status=`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.registry.list(params.status).await;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
///
/// Get a single job record by ID.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = state.registry.view(job_id).await?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/jobs/{id}/status
///
/// Compact status view: status, exit code, error, timestamps.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = state.registry.view(job_id).await?;
    Ok(Json(DataResponse {
        data: JobStatusView::from(&record),
    }))
}

/// GET /api/v1/jobs/{id}/logs
///
/// Snapshot of the retained log lines; `?tail=N` limits to the last N.
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Query(params): Query<LogsQuery>,
) -> AppResult<impl IntoResponse> {
    let lines = state.registry.snapshot_logs(job_id, params.tail).await?;
    Ok(Json(DataResponse { data: lines }))
}

// ---------------------------------------------------------------------------
// Cancel / Delete
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cancellation of a pending or running job. Returns 204; the
/// status transition happens on the executor's task. 409 when the job is
/// already in a terminal state.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.registry.cancel(job_id).await?;
    tracing::info!(job_id = %job_id, "Job cancellation requested");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/jobs/{id}
///
/// Remove a terminal job record. 409 while the job is pending or running.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.registry.delete(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
