use std::sync::Arc;

use segtrain_events::EventBus;
use segtrain_runner::{JobRegistry, TrainingExecutor};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shared in-memory job table.
    pub registry: Arc<JobRegistry>,
    /// Subprocess executor for training jobs.
    pub executor: Arc<TrainingExecutor>,
    /// WebSocket connection manager (dashboard clients).
    pub ws_manager: Arc<WsManager>,
    /// Lifecycle event bus.
    pub event_bus: Arc<EventBus>,
}
