//! Training executor: one subprocess per job.
//!
//! The executor launches the external training launch wrapper, captures its
//! stdout and stderr line-by-line into the job's log buffer, mirrors every
//! line to an on-disk log file, and drives the job's terminal transition.
//! Cancellation is observed through the job's `CancellationToken`: the child
//! gets SIGTERM first and is killed outright once the grace period expires.
//!
//! No retries are performed: a failed job is terminal and must be
//! resubmitted.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use segtrain_core::command::build_launch_command;
use segtrain_core::error::CoreResult;
use segtrain_core::job::JobRecord;
use segtrain_core::log_buffer::LogBuffer;
use segtrain_core::types::JobId;

use crate::registry::JobRegistry;

/// How long a cancelled child may linger after SIGTERM before SIGKILL.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Visual separator written around lifecycle messages in the captured log.
const LOG_SEPARATOR: &str =
    "================================================================================";

/// Spawns, monitors, and terminates training subprocesses.
///
/// Shared via `Arc`; every job runs on its own background task through
/// [`TrainingExecutor::spawn`], or inline through
/// [`TrainingExecutor::execute`] for synchronous submissions.
pub struct TrainingExecutor {
    registry: Arc<JobRegistry>,
    project_root: PathBuf,
    scripts_dir: PathBuf,
    log_dir: PathBuf,
    cancel_grace: Duration,
}

impl TrainingExecutor {
    /// Create an executor rooted at `project_root`.
    ///
    /// Launch wrappers are expected under `<root>/scripts`, log files are
    /// written under `<root>/experiments/logs`.
    pub fn new(registry: Arc<JobRegistry>, project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let scripts_dir = project_root.join("scripts");
        let log_dir = project_root.join("experiments").join("logs");
        Self {
            registry,
            project_root,
            scripts_dir,
            log_dir,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Override the SIGTERM-to-SIGKILL grace period.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Directory the launch wrappers are resolved from.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Run a job on a background task (asynchronous submissions).
    pub fn spawn(self: &Arc<Self>, job_id: JobId) -> JoinHandle<()> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = executor.execute(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Executor task failed");
            }
        })
    }

    /// Execute a pending job to its terminal state.
    ///
    /// Returns `Ok` for every per-job outcome (completed, failed, cancelled,
    /// or skipped because the job was cancelled before launch); `Err` only
    /// for registry-level faults such as an unknown job id.
    pub async fn execute(&self, job_id: JobId) -> CoreResult<()> {
        let record = self.registry.view(job_id).await?;
        let log = self.registry.log_buffer(job_id).await?;
        let cancel = self.registry.cancel_token(job_id).await?;

        let command = build_launch_command(&self.scripts_dir, record.dataset_type, &record.parameters);

        // A missing launch wrapper fails the job without ever starting it.
        let script = Path::new(&command.args[0]);
        if !script.is_file() {
            let message = format!("Training script not found: {}", script.display());
            log.append(format!("ERROR: {message}"));
            if let Err(e) = self.registry.fail(job_id, message, None).await {
                tracing::debug!(job_id = %job_id, error = %e, "Fail transition skipped");
            }
            return Ok(());
        }

        // Cancelled while pending: the transition below is rejected and the
        // subprocess is never spawned.
        if self.registry.mark_started(job_id).await.is_err() {
            tracing::debug!(job_id = %job_id, "Job no longer pending, skipping launch");
            return Ok(());
        }

        // Mirror everything appended to the buffer into the on-disk file.
        let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
        let writer = spawn_log_writer(self.open_log_file(&record).await, line_rx);

        let emit = |line: String| {
            log.append(line.clone());
            let _ = line_tx.send(line);
        };
        emit(format!("Executing: {}", command.display_line()));
        emit(LOG_SEPARATOR.to_string());

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to launch training process: {e}");
                emit(format!("ERROR: {message}"));
                drop(line_tx);
                let _ = writer.await;
                if let Err(e) = self.registry.fail(job_id, message, None).await {
                    tracing::debug!(job_id = %job_id, error = %e, "Fail transition skipped");
                }
                return Ok(());
            }
        };

        let stdout_task = child
            .stdout
            .take()
            .map(|r| spawn_line_reader(r, Arc::clone(&log), line_tx.clone()));
        let stderr_task = child
            .stderr
            .take()
            .map(|r| spawn_line_reader(r, Arc::clone(&log), line_tx.clone()));

        let wait_result = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };

        // Readers run to EOF once the child is gone, whichever branch won.
        let drain = async {
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
        };

        match wait_result {
            None => {
                self.terminate(&mut child, job_id).await;
                drain.await;
                emit(LOG_SEPARATOR.to_string());
                emit("Training cancelled by user".to_string());
                if let Err(e) = self.registry.mark_cancelled(job_id).await {
                    tracing::debug!(job_id = %job_id, error = %e, "Cancel transition skipped");
                }
            }
            Some(Ok(status)) => {
                drain.await;
                match status.code() {
                    Some(0) => {
                        emit(LOG_SEPARATOR.to_string());
                        emit("Training completed successfully".to_string());
                        if let Err(e) = self.registry.complete(job_id).await {
                            tracing::debug!(job_id = %job_id, error = %e, "Complete transition skipped");
                        }
                    }
                    code => {
                        let code = code.unwrap_or(-1);
                        let message = format!("Training failed with exit code {code}");
                        emit(LOG_SEPARATOR.to_string());
                        emit(format!("ERROR: {message}"));
                        if let Err(e) = self.registry.fail(job_id, message, Some(code)).await {
                            tracing::debug!(job_id = %job_id, error = %e, "Fail transition skipped");
                        }
                    }
                }
            }
            Some(Err(e)) => {
                drain.await;
                let message = format!("Failed to wait for training process: {e}");
                emit(format!("ERROR: {message}"));
                if let Err(e) = self.registry.fail(job_id, message, None).await {
                    tracing::debug!(job_id = %job_id, error = %e, "Fail transition skipped");
                }
            }
        }

        drop(line_tx);
        let _ = writer.await;
        Ok(())
    }

    /// Terminate a running child: SIGTERM, bounded grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child, job_id: JobId) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            match tokio::time::timeout(self.cancel_grace, child.wait()).await {
                Ok(_) => return,
                Err(_) => {
                    tracing::warn!(
                        job_id = %job_id,
                        grace_secs = self.cancel_grace.as_secs(),
                        "Process did not exit within grace period, killing",
                    );
                }
            }
        }

        if let Err(e) = child.kill().await {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to kill training process");
        }
        let _ = child.wait().await;
    }

    /// Create the per-job log file and record its path.
    ///
    /// Best-effort: on failure the job still runs, with buffer-only capture.
    async fn open_log_file(&self, record: &JobRecord) -> Option<tokio::fs::File> {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            tracing::warn!(
                error = %e,
                dir = %self.log_dir.display(),
                "Could not create log directory",
            );
            return None;
        }

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let id = record.job_id.simple().to_string();
        let name = format!(
            "training_{}_{}_{stamp}.log",
            record.dataset_type,
            &id[..8],
        );
        let path = self.log_dir.join(name);

        match tokio::fs::File::create(&path).await {
            Ok(file) => {
                let _ = self
                    .registry
                    .set_log_path(record.job_id, path.to_string_lossy().into_owned())
                    .await;
                Some(file)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Could not create log file");
                None
            }
        }
    }
}

/// Read one output stream line-by-line into the log buffer and the file
/// mirror channel.
fn spawn_line_reader<R>(
    reader: R,
    log: Arc<LogBuffer>,
    line_tx: mpsc::UnboundedSender<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log.append(line.clone());
            let _ = line_tx.send(line);
        }
    })
}

/// Drain the mirror channel into the log file, if one could be created.
fn spawn_log_writer(
    file: Option<tokio::fs::File>,
    mut line_rx: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut file = file;
        while let Some(line) = line_rx.recv().await {
            if let Some(f) = file.as_mut() {
                let _ = f.write_all(line.as_bytes()).await;
                let _ = f.write_all(b"\n").await;
            }
        }
        if let Some(f) = file.as_mut() {
            let _ = f.flush().await;
        }
    })
}
