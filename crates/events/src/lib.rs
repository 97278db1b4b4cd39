//! Job lifecycle event bus.
//!
//! A thin in-process publish/subscribe hub: the runner publishes a
//! [`JobEvent`] on every job state change; the API layer forwards them to
//! dashboard WebSocket clients.

pub mod bus;

pub use bus::{EventBus, JobEvent};
