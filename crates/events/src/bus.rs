//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use segtrain_core::types::JobId;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Event name: a job record was created.
pub const EVENT_JOB_SUBMITTED: &str = "job.submitted";

/// Event name: the training subprocess started.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// Event name: the subprocess exited with code 0.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Event name: the subprocess exited non-zero or could not be launched.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// Event name: the job was cancelled before or during execution.
pub const EVENT_JOB_CANCELLED: &str = "job.cancelled";

/// Event name: a terminal job record was deleted.
pub const EVENT_JOB_DELETED: &str = "job.deleted";

/// A job lifecycle event.
///
/// Constructed via [`JobEvent::new`] and enriched with
/// [`with_payload`](JobEvent::with_payload).
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.started"`.
    pub event_type: String,

    /// The job the event concerns.
    pub job_id: JobId,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Create a new event with an empty payload.
    pub fn new(event_type: impl Into<String>, job_id: JobId) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
