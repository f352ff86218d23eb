//! Retry Coordinator
//!
//! Drives a job's tasks one at a time in scheduler order. Each attempt marks
//! the task in progress, invokes the generation collaborator under a bounded
//! timeout, and writes the classified outcome back to the store. Transient
//! failures route the task back to the queue; the backoff delay before the
//! next attempt is re-derived from the record's last-write timestamp, so a
//! process restart mid-delay loses nothing.
//!
//! A cancel token reaches every sleep point: the backoff wait and the
//! collaborator call itself. A task canceled mid-attempt goes back to the
//! queue rather than lingering in progress.

use crate::config::{ExecutionConfig, RetryPolicy};
use crate::error::{SpoolError, StoreError};
use crate::generator::{fallback_asset, GenerateError, Generator};
use crate::resume::requeue_stranded;
use crate::store::{TaskRecord, TaskStatus, TaskStore};
use crate::types::{now_millis, JobId, TaskId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Cooperative stop signal. Cloned freely; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Caller-held side of a cancel pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// A token that can never fire, for callers that run to completion.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }

    pub fn is_canceled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the handle fires. If the handle is dropped without
    /// firing, cancellation can no longer happen and this pends forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

/// What one run over a job accomplished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Tasks that reached completed during this run.
    pub completed: u32,
    /// Subset of `completed` that finished on a substituted fallback asset.
    pub completed_with_fallback: u32,
    /// Tasks that exhausted their attempts during this run.
    pub failed: u32,
    /// True when the run stopped on a cancel rather than settling the job.
    pub canceled: bool,
}

enum TaskOutcome {
    Completed { fallback: bool },
    Failed,
    Canceled,
}

/// Executes one job's queued tasks against the generation collaborator.
pub struct JobRunner {
    store: Arc<dyn TaskStore>,
    generator: Arc<dyn Generator>,
    execution: ExecutionConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        generator: Arc<dyn Generator>,
        execution: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            generator,
            execution,
        }
    }

    /// Drive every queued task of a job to a terminal state, in scheduler
    /// order. A failed task does not stop the run; later tasks still execute.
    /// The retry policy comes from the job record's snapshot, never from live
    /// configuration.
    pub async fn run_job(
        &self,
        job_id: &JobId,
        cancel: &CancelToken,
    ) -> Result<RunReport, SpoolError> {
        let job = self
            .store
            .get_job(job_id)
            .map_err(map_lookup)?
            .ok_or_else(|| SpoolError::JobNotFound(job_id.clone()))?;
        let request_timeout = Duration::from_secs(self.execution.request_timeout_secs);

        // This run owns every task of the job, so an in-progress marker at
        // entry can only be a leftover from a dead process.
        let stranded = requeue_stranded(self.store.as_ref(), job_id)?;
        if !stranded.is_empty() {
            debug!(job_id = %job_id, count = stranded.len(), "recovered stranded tasks before run");
        }

        let tasks = self.store.list_by_job(job_id)?;
        let queued = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .count();
        info!(
            job_id = %job_id,
            total = tasks.len(),
            queued,
            model = self.generator.model_name(),
            "running job"
        );

        let mut report = RunReport::default();
        for task in &tasks {
            if task.status != TaskStatus::Queued {
                continue;
            }
            if cancel.is_canceled() {
                report.canceled = true;
                break;
            }
            match self
                .drive_task(&task.task_id, &job.policy, request_timeout, cancel)
                .await?
            {
                TaskOutcome::Completed { fallback } => {
                    report.completed += 1;
                    if fallback {
                        report.completed_with_fallback += 1;
                    }
                }
                TaskOutcome::Failed => report.failed += 1,
                TaskOutcome::Canceled => {
                    report.canceled = true;
                    break;
                }
            }
        }

        self.store.flush()?;
        info!(
            job_id = %job_id,
            completed = report.completed,
            with_fallback = report.completed_with_fallback,
            failed = report.failed,
            canceled = report.canceled,
            "run finished"
        );
        Ok(report)
    }

    /// Attempt one task until it reaches a terminal state or the run is
    /// canceled. Waits out any backoff still owed from the previous attempt
    /// before touching the collaborator again.
    async fn drive_task(
        &self,
        task_id: &TaskId,
        policy: &RetryPolicy,
        request_timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<TaskOutcome, SpoolError> {
        loop {
            let task = self
                .store
                .get_task(task_id)
                .map_err(map_lookup)?
                .ok_or_else(|| SpoolError::TaskNotFound(task_id.clone()))?;
            match task.status {
                TaskStatus::Completed => return Ok(TaskOutcome::Completed { fallback: false }),
                TaskStatus::Failed => return Ok(TaskOutcome::Failed),
                TaskStatus::InProgress => {
                    self.store.set_status(
                        task_id,
                        TaskStatus::Queued,
                        Some("process interrupted mid-attempt".to_string()),
                    )?;
                    continue;
                }
                TaskStatus::Queued => {}
            }

            let wait = remaining_delay(&task, policy);
            if !wait.is_zero() {
                debug!(
                    task_id = %task_id,
                    wait_ms = wait.as_millis() as u64,
                    "waiting out retry backoff"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(TaskOutcome::Canceled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            let task = self
                .store
                .set_status(task_id, TaskStatus::InProgress, None)?;
            let attempt = task.attempts;
            debug!(task_id = %task_id, attempt, kind = %task.kind, "attempting task");

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    // The collaborator call may already have fired; the
                    // attempt stays counted.
                    self.store.set_status(
                        task_id,
                        TaskStatus::Queued,
                        Some("canceled mid-attempt".to_string()),
                    )?;
                    return Ok(TaskOutcome::Canceled);
                }
                result = tokio::time::timeout(
                    request_timeout,
                    self.generator.generate(task.kind, &task.payload),
                ) => result,
            };

            let result = match result {
                Ok(inner) => inner,
                Err(_) => Err(GenerateError::Transient {
                    message: format!(
                        "generation call exceeded its {}s budget",
                        request_timeout.as_secs()
                    ),
                }),
            };

            match result {
                Ok(asset) => {
                    self.store.set_status(task_id, TaskStatus::Completed, None)?;
                    debug!(task_id = %task_id, attempt, model = %asset.model, "task completed");
                    return Ok(TaskOutcome::Completed { fallback: false });
                }
                Err(GenerateError::Malformed { message, partial }) => {
                    // Malformed output is recovered locally, not retried; the
                    // collaborator did service the request.
                    let asset = fallback_asset(task.kind, partial.as_ref());
                    self.store.set_status(task_id, TaskStatus::Completed, None)?;
                    warn!(
                        task_id = %task_id,
                        attempt,
                        error = %message,
                        substitute = %asset.content,
                        "substituted fallback for malformed output"
                    );
                    return Ok(TaskOutcome::Completed { fallback: true });
                }
                Err(GenerateError::Transient { message }) => {
                    if attempt >= policy.max_attempts {
                        self.store
                            .set_status(task_id, TaskStatus::Failed, Some(message.clone()))?;
                        warn!(
                            task_id = %task_id,
                            attempt,
                            error = %message,
                            "task failed after exhausting attempts"
                        );
                        return Ok(TaskOutcome::Failed);
                    }
                    self.store
                        .set_status(task_id, TaskStatus::Queued, Some(message.clone()))?;
                    debug!(task_id = %task_id, attempt, error = %message, "transient failure, requeued");
                }
            }
        }
    }
}

fn map_lookup(err: StoreError) -> SpoolError {
    match err {
        StoreError::JobNotFound(id) => SpoolError::JobNotFound(id),
        StoreError::TaskNotFound(id) => SpoolError::TaskNotFound(id),
        other => SpoolError::Storage(other),
    }
}

/// Backoff still owed before the next attempt of a queued task.
///
/// The full delay for attempt `n` comes from the policy; whatever portion
/// already elapsed since the record's last write is subtracted, so a restart
/// mid-delay does not start the wait over.
fn remaining_delay(task: &TaskRecord, policy: &RetryPolicy) -> Duration {
    let full = policy.delay_before(task.attempts + 1);
    if full.is_zero() {
        return Duration::ZERO;
    }
    let elapsed_ms = now_millis().saturating_sub(task.updated_at_ms);
    full.saturating_sub(Duration::from_millis(elapsed_ms))
}
