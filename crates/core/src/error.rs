use crate::types::JobId;

/// Domain error taxonomy.
///
/// `ConfigMissing`, `NotFound`, `InvalidState`, and `Validation` surface
/// synchronously to the caller as request errors. `LaunchFailure` and
/// `ProcessFailure` are recorded on the job record and only observed through
/// later status or log queries.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No config reference supplied: {0}")]
    ConfigMissing(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to launch training process: {0}")]
    LaunchFailure(String),

    #[error("Training process exited with code {exit_code}")]
    ProcessFailure { exit_code: i32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for domain results.
pub type CoreResult<T> = Result<T, CoreError>;
