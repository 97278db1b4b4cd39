//! WebSocket infrastructure.
//!
//! Two kinds of connections exist: dashboard sockets (`/api/v1/ws`), which
//! receive every job lifecycle event, and per-job log streams
//! (`/api/v1/jobs/{id}/logs/stream`), which replay the retained log backlog
//! and then deliver live lines until the job's terminal event.

pub mod handler;
pub mod heartbeat;
pub mod logs;
pub mod manager;

pub use handler::dashboard_ws;
pub use heartbeat::start_heartbeat;
pub use logs::job_logs_ws;
pub use manager::WsManager;
