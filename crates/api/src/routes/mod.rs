pub mod health;
pub mod jobs;
pub mod train;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                              dashboard WebSocket (lifecycle events)
///
/// /train/rf100vl                   submit RF100-VL job (POST)
/// /train/odinw                     submit ODinW job (POST)
///
/// /jobs                            list jobs (GET)
/// /jobs/{id}                       get record (GET), delete (DELETE)
/// /jobs/{id}/status                compact status view (GET)
/// /jobs/{id}/logs                  log snapshot (GET)
/// /jobs/{id}/logs/stream           log stream WebSocket
/// /jobs/{id}/cancel                request cancellation (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/train", train::router())
        .nest("/jobs", jobs::router())
        .route("/ws", get(ws::dashboard_ws))
}
