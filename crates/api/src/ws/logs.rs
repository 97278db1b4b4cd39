//! Per-job log streaming over WebSocket.
//!
//! Delivery contract: every already-buffered line first (as plain text
//! frames, oldest to newest), then live lines in arrival order, then a final
//! JSON frame carrying the terminal status and exit code, then Close. Each
//! connection gets its own subscription, so multiple simultaneous clients
//! all observe the full sequence independently.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;

use segtrain_core::log_buffer::{LogEvent, LogSubscription, TerminalEvent};
use segtrain_core::types::JobId;

use crate::error::AppResult;
use crate::state::AppState;

/// HTTP handler that upgrades to a per-job log stream.
///
/// The subscription is taken before the upgrade so an unknown job id is
/// rejected as a plain HTTP 404 instead of a doomed WebSocket handshake.
pub async fn job_logs_ws(
    ws: WebSocketUpgrade,
    Path(job_id): Path<JobId>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let subscription = state.registry.subscribe_logs(job_id).await?;
    tracing::debug!(job_id = %job_id, "Log stream subscriber attached");
    Ok(ws.on_upgrade(move |socket| stream_job_logs(socket, job_id, subscription)))
}

/// Drive one log stream connection to completion.
async fn stream_job_logs(mut socket: WebSocket, job_id: JobId, subscription: LogSubscription) {
    let LogSubscription {
        backlog,
        terminal,
        mut live,
    } = subscription;

    // Replay the retained backlog first.
    for line in backlog {
        if socket.send(Message::Text(line.into())).await.is_err() {
            return;
        }
    }

    // Job already finished: terminal event, close, done.
    if let Some(event) = terminal {
        let _ = send_terminal(&mut socket, event).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    // Live phase: forward lines until the terminal event arrives.
    loop {
        match live.recv().await {
            Ok(LogEvent::Line { text }) => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            Ok(LogEvent::Terminal(event)) => {
                let _ = send_terminal(&mut socket, event).await;
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(job_id = %job_id, skipped, "Log stream subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    tracing::debug!(job_id = %job_id, "Log stream subscriber finished");
}

/// Send the final structured event (`{"type":"terminal",...}`).
async fn send_terminal(socket: &mut WebSocket, event: TerminalEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(&LogEvent::Terminal(event))
        .unwrap_or_else(|_| r#"{"type":"terminal"}"#.to_string());
    socket.send(Message::Text(payload.into())).await
}
