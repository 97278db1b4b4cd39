//! Job tracking and execution.
//!
//! [`registry::JobRegistry`] is the shared in-memory job table: submission,
//! status queries, log subscription, cancellation, deletion, and the guarded
//! status transitions that keep the state machine honest.
//! [`executor::TrainingExecutor`] owns the subprocess side: one task per
//! in-flight job, line-by-line output capture, log-file mirroring, and
//! graceful termination.

pub mod executor;
pub mod registry;

pub use executor::TrainingExecutor;
pub use registry::JobRegistry;
