//! Route definitions for the `/train` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::train;
use crate::state::AppState;

/// Routes mounted at `/train`.
///
/// ```text
/// POST /rf100vl   -> submit_rf100vl
/// POST /odinw     -> submit_odinw
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rf100vl", post(train::submit_rf100vl))
        .route("/odinw", post(train::submit_odinw))
}
