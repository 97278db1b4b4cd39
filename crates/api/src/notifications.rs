//! Forwards job lifecycle events to dashboard WebSocket clients.
//!
//! A single long-lived task subscribed to the [`EventBus`]; every received
//! [`JobEvent`] is serialized once and broadcast to all registered
//! connections. The task ends when the bus's last sender is dropped.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use segtrain_events::JobEvent;

use crate::ws::WsManager;

/// Routes lifecycle events from the bus onto dashboard connections.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the event bus is closed.
    pub async fn run(self, mut rx: Receiver<JobEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize job event");
                            continue;
                        }
                    };
                    self.ws_manager.broadcast(Message::Text(payload.into())).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification router lagged behind event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("Notification router stopped");
    }
}
