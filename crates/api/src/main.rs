use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use segtrain_api::config::ServerConfig;
use segtrain_api::notifications::NotificationRouter;
use segtrain_api::router::build_app_router;
use segtrain_api::state::AppState;
use segtrain_api::ws;
use segtrain_events::EventBus;
use segtrain_runner::{JobRegistry, TrainingExecutor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segtrain=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        project_root = %config.project_root.display(),
        "Loaded server configuration",
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Job registry and executor ---
    let registry = Arc::new(JobRegistry::new(Arc::clone(&event_bus)));
    let executor = Arc::new(
        TrainingExecutor::new(Arc::clone(&registry), config.project_root.clone())
            .with_cancel_grace(Duration::from_secs(config.cancel_grace_secs)),
    );
    tracing::info!("Job registry and executor created");

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Spawn notification router (forwards lifecycle events to dashboards).
    let notification_router = NotificationRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));
    tracing::info!("Notification router started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        executor: Arc::clone(&executor),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Cancel in-flight jobs and give their executors a bounded window to
    // terminate the training processes.
    registry.cancel_all().await;
    let drained = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        async {
            while registry.active_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        },
    )
    .await
    .is_ok();
    if drained {
        tracing::info!("All jobs reached a terminal state");
    } else {
        tracing::warn!("Shutdown timeout expired with jobs still active");
    }

    // Drop the event bus sender to close the broadcast channel. This signals
    // the notification router to shut down.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Notification router shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
