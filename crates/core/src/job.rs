//! Job record and status state machine.
//!
//! A job tracks one invocation of the external training launch wrapper.
//! Status transitions are monotonic: once a job reaches a terminal state
//! (completed, failed, cancelled) no further transition is permitted. The
//! registry enforces this through [`JobStatus::can_transition_to`].

use serde::{Deserialize, Serialize};

use crate::params::{DatasetType, ExecutionMode, TrainingParameters};
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// ```text
/// pending -> running -> { completed | failed | cancelled }
/// pending -> cancelled          (cancel before the subprocess starts)
/// pending -> failed             (launch wrapper missing or unspawnable)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits the `self -> next` edge.
    ///
    /// Terminal states permit nothing. `pending` may start, be cancelled
    /// before the subprocess exists, or fail at launch; `running` may move
    /// to any terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled | Self::Failed),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Wire name of the status (matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// One tracked invocation of the external training command.
///
/// `job_id`, `dataset_type`, `created_at`, `execution_mode`, and `parameters`
/// are immutable after submission. `exit_code` is set at most once, when the
/// underlying process terminates.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub dataset_type: DatasetType,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub execution_mode: ExecutionMode,
    pub parameters: TrainingParameters,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    /// Path of the on-disk log file mirroring the captured output.
    pub log_path: Option<String>,
}

impl JobRecord {
    /// Create a fresh record in `pending` state.
    pub fn new(
        dataset_type: DatasetType,
        execution_mode: ExecutionMode,
        parameters: TrainingParameters,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4(),
            dataset_type,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            execution_mode,
            parameters,
            exit_code: None,
            error_message: None,
            log_path: None,
        }
    }
}

/// Compact view returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            status: record.status,
            exit_code: record.exit_code,
            error_message: record.error_message.clone(),
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn all_statuses() -> [JobStatus; 5] {
        [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ]
    }

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        for from in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            for to in all_statuses() {
                assert!(
                    !from.can_transition_to(to),
                    "terminal {from} must not transition to {to}"
                );
            }
        }
    }

    #[test]
    fn pending_can_start_or_cancel() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn running_can_reach_every_terminal_state() {
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Running).expect("serialize");
        assert_eq!(json, "\"running\"");
        let parsed: JobStatus = serde_json::from_str("\"cancelled\"").expect("deserialize");
        assert_eq!(parsed, JobStatus::Cancelled);
    }

    #[test]
    fn new_record_is_pending_with_no_timestamps() {
        let record = JobRecord::new(
            DatasetType::Rf100vl,
            ExecutionMode::Async,
            TrainingParameters::default(),
        );
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.started_at.is_none());
        assert!(record.completed_at.is_none());
        assert!(record.exit_code.is_none());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn record_ids_are_unique() {
        let a = JobRecord::new(
            DatasetType::Rf100vl,
            ExecutionMode::Async,
            TrainingParameters::default(),
        );
        let b = JobRecord::new(
            DatasetType::Odinw,
            ExecutionMode::Async,
            TrainingParameters::default(),
        );
        assert_ne!(a.job_id, b.job_id);
    }
}
