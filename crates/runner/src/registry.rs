//! Shared in-memory job table.
//!
//! The registry is an explicit injected store (never a process-wide
//! singleton): a `RwLock<HashMap>` of job entries, each holding the record,
//! its log buffer, and its cancellation token. All status mutation funnels
//! through [`JobRegistry::transition`], which enforces the state machine,
//! stamps timestamps, finalizes the log buffer on terminal transitions, and
//! publishes the matching lifecycle event.
//!
//! There is no persistence: process restart loses all job history.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use segtrain_core::error::{CoreError, CoreResult};
use segtrain_core::job::{JobRecord, JobStatus};
use segtrain_core::log_buffer::{LogBuffer, LogSubscription, DEFAULT_RETAINED_LINES};
use segtrain_core::params::{DatasetType, ExecutionMode, TrainingParameters};
use segtrain_core::types::JobId;
use segtrain_events::bus::{
    EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_DELETED, EVENT_JOB_FAILED,
    EVENT_JOB_STARTED, EVENT_JOB_SUBMITTED,
};
use segtrain_events::{EventBus, JobEvent};

/// One tracked job: record, log buffer, cancellation handle.
struct JobEntry {
    record: JobRecord,
    log: Arc<LogBuffer>,
    cancel: CancellationToken,
}

/// Shared in-memory job table.
///
/// Designed to be wrapped in `Arc` and shared between HTTP handlers and
/// executor tasks. Jobs are fully independent; the table itself is the only
/// shared resource.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    bus: Arc<EventBus>,
    log_capacity: usize,
}

impl JobRegistry {
    /// Create an empty registry publishing lifecycle events on `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            bus,
            log_capacity: DEFAULT_RETAINED_LINES,
        }
    }

    /// Override the per-job log retention cap (tests use small buffers).
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    // -----------------------------------------------------------------------
    // Submission / lookup
    // -----------------------------------------------------------------------

    /// Validate the submission and allocate a job record in `pending` state.
    ///
    /// Fails with [`CoreError::ConfigMissing`] when the parameters carry no
    /// config reference; no record is allocated in that case.
    pub async fn create(
        &self,
        dataset: DatasetType,
        execution_mode: ExecutionMode,
        parameters: TrainingParameters,
    ) -> CoreResult<JobRecord> {
        parameters.validate(dataset)?;

        let record = JobRecord::new(dataset, execution_mode, parameters);
        let entry = JobEntry {
            record: record.clone(),
            log: Arc::new(LogBuffer::new(self.log_capacity)),
            cancel: CancellationToken::new(),
        };

        self.jobs.write().await.insert(record.job_id, entry);

        tracing::info!(job_id = %record.job_id, dataset = %dataset, "Job submitted");
        self.bus.publish(
            JobEvent::new(EVENT_JOB_SUBMITTED, record.job_id).with_payload(serde_json::json!({
                "dataset_type": dataset,
                "status": record.status,
            })),
        );

        Ok(record)
    }

    /// Current record for a job.
    pub async fn view(&self, job_id: JobId) -> CoreResult<JobRecord> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|entry| entry.record.clone())
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })
    }

    /// All records, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        let jobs = self.jobs.read().await;
        let mut records: Vec<JobRecord> = jobs
            .values()
            .filter(|entry| status.is_none_or(|s| entry.record.status == s))
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of jobs currently pending or running.
    pub async fn active_count(&self) -> usize {
        let jobs = self.jobs.read().await;
        jobs.values()
            .filter(|entry| !entry.record.status.is_terminal())
            .count()
    }

    // -----------------------------------------------------------------------
    // Logs
    // -----------------------------------------------------------------------

    /// The job's log buffer (executor side).
    pub async fn log_buffer(&self, job_id: JobId) -> CoreResult<Arc<LogBuffer>> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|entry| Arc::clone(&entry.log))
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })
    }

    /// Replay-then-live log subscription for a job.
    pub async fn subscribe_logs(&self, job_id: JobId) -> CoreResult<LogSubscription> {
        Ok(self.log_buffer(job_id).await?.subscribe())
    }

    /// Snapshot of the retained log lines; `tail` limits to the last N.
    pub async fn snapshot_logs(&self, job_id: JobId, tail: Option<usize>) -> CoreResult<Vec<String>> {
        Ok(self.log_buffer(job_id).await?.snapshot(tail))
    }

    /// Record the on-disk log file path on the job record.
    pub async fn set_log_path(&self, job_id: JobId, path: String) -> CoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&job_id).ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;
        entry.record.log_path = Some(path);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cancellation / execution handles
    // -----------------------------------------------------------------------

    /// The job's cancellation token (executor side).
    pub async fn cancel_token(&self, job_id: JobId) -> CoreResult<CancellationToken> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|entry| entry.cancel.clone())
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })
    }

    /// Request cancellation of a pending or running job.
    ///
    /// Best-effort and asynchronous: a pending job is marked `cancelled`
    /// immediately (its executor observes this and never spawns); a running
    /// job has its token cancelled and the executor performs the actual
    /// process termination and status transition. Terminal jobs are rejected
    /// with [`CoreError::InvalidState`].
    pub async fn cancel(&self, job_id: JobId) -> CoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&job_id).ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

        match entry.record.status {
            JobStatus::Pending => {
                entry.cancel.cancel();
                Self::apply(&self.bus, entry, JobStatus::Cancelled, None, None);
                Ok(())
            }
            JobStatus::Running => {
                entry.cancel.cancel();
                tracing::info!(job_id = %job_id, "Cancellation requested");
                Ok(())
            }
            status => Err(CoreError::InvalidState(format!(
                "cannot cancel job in terminal state {status}"
            ))),
        }
    }

    /// Remove a terminal job record entirely.
    ///
    /// Rejected with [`CoreError::InvalidState`] while the job is pending or
    /// running; cancel first.
    pub async fn delete(&self, job_id: JobId) -> CoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get(&job_id).ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

        if !entry.record.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "cannot delete job in state {}",
                entry.record.status
            )));
        }

        jobs.remove(&job_id);
        tracing::info!(job_id = %job_id, "Job deleted");
        self.bus.publish(JobEvent::new(EVENT_JOB_DELETED, job_id));
        Ok(())
    }

    /// Cancel every non-terminal job. Used during graceful shutdown.
    pub async fn cancel_all(&self) {
        let jobs = self.jobs.read().await;
        for entry in jobs.values() {
            if !entry.record.status.is_terminal() {
                entry.cancel.cancel();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Executor-driven transitions
    // -----------------------------------------------------------------------

    /// `pending -> running`. Fails when the job was cancelled first, which
    /// tells the executor to abort without spawning.
    pub async fn mark_started(&self, job_id: JobId) -> CoreResult<()> {
        self.transition(job_id, JobStatus::Running, None, None).await
    }

    /// `running -> completed` with exit code 0.
    pub async fn complete(&self, job_id: JobId) -> CoreResult<()> {
        self.transition(job_id, JobStatus::Completed, Some(0), None)
            .await
    }

    /// `pending|running -> failed`, recording the captured error and, when
    /// the process ran at all, its exit code.
    pub async fn fail(
        &self,
        job_id: JobId,
        error_message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> CoreResult<()> {
        self.transition(job_id, JobStatus::Failed, exit_code, Some(error_message.into()))
            .await
    }

    /// `pending|running -> cancelled`. The exit code of a killed process is
    /// deliberately not recorded.
    pub async fn mark_cancelled(&self, job_id: JobId) -> CoreResult<()> {
        self.transition(job_id, JobStatus::Cancelled, None, None)
            .await
    }

    /// Guarded status transition. Rejects every edge the state machine does
    /// not permit, so no job ever leaves a terminal state.
    async fn transition(
        &self,
        job_id: JobId,
        next: JobStatus,
        exit_code: Option<i32>,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&job_id).ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

        if !entry.record.status.can_transition_to(next) {
            return Err(CoreError::InvalidState(format!(
                "transition {} -> {next} is not permitted",
                entry.record.status
            )));
        }

        Self::apply(&self.bus, entry, next, exit_code, error_message);
        Ok(())
    }

    /// Apply an already-validated transition: stamp timestamps, finalize the
    /// log buffer on terminal states, publish the lifecycle event.
    fn apply(
        bus: &EventBus,
        entry: &mut JobEntry,
        next: JobStatus,
        exit_code: Option<i32>,
        error_message: Option<String>,
    ) {
        let now = chrono::Utc::now();
        entry.record.status = next;

        if next == JobStatus::Running && entry.record.started_at.is_none() {
            entry.record.started_at = Some(now);
        }
        if let Some(code) = exit_code {
            entry.record.exit_code = Some(code);
        }
        if let Some(message) = error_message {
            entry.record.error_message = Some(message);
        }

        if next.is_terminal() {
            entry.record.completed_at = Some(now);
            entry.log.terminate(next, entry.record.exit_code);
        }

        let event_type = match next {
            JobStatus::Running => EVENT_JOB_STARTED,
            JobStatus::Completed => EVENT_JOB_COMPLETED,
            JobStatus::Failed => EVENT_JOB_FAILED,
            JobStatus::Cancelled => EVENT_JOB_CANCELLED,
            JobStatus::Pending => return,
        };

        tracing::info!(
            job_id = %entry.record.job_id,
            status = %next,
            exit_code = ?entry.record.exit_code,
            "Job status changed",
        );

        bus.publish(
            JobEvent::new(event_type, entry.record.job_id).with_payload(serde_json::json!({
                "status": next,
                "exit_code": entry.record.exit_code,
                "dataset_type": entry.record.dataset_type,
            })),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
