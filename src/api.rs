//! Consumer Surface
//!
//! The facade the UI/CLI layer talks to. Start a job, poll its progress,
//! classify it after a disconnect, resume it, retry a failed task. Every
//! operation works from the task store, so any process holding the store can
//! serve any of them.

use crate::config::SpoolConfig;
use crate::error::{SpoolError, StoreError};
use crate::generator::Generator;
use crate::plan::{decompose, JobRequest};
use crate::progress::{aggregate, ProgressSnapshot};
use crate::resume::{classify, requeue_stranded, resumable_tasks, JobClassification, ResumeReport};
use crate::runner::{CancelToken, JobRunner, RunReport};
use crate::store::{JobRecord, TaskRecord, TaskStore};
use crate::types::{now_millis, JobId, TaskId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Acknowledgement returned by `start_job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStarted {
    pub job_id: JobId,
    pub total_tasks: u32,
    pub test_mode: bool,
}

/// Job orchestration service.
pub struct JobApi {
    store: Arc<dyn TaskStore>,
    runner: JobRunner,
    config: SpoolConfig,
}

impl JobApi {
    pub fn new(
        store: Arc<dyn TaskStore>,
        generator: Arc<dyn Generator>,
        config: SpoolConfig,
    ) -> Self {
        let runner = JobRunner::new(store.clone(), generator, config.execution.clone());
        Self {
            store,
            runner,
            config,
        }
    }

    /// Decompose a request into tasks and persist them, ready to run.
    ///
    /// The current retry policy is snapshotted into the job record here;
    /// later configuration edits never change how this job retries. Returns
    /// as soon as the records are durable. Nothing executes until `run_job`.
    pub fn start_job(&self, job_id: JobId, request: JobRequest) -> Result<JobStarted, SpoolError> {
        if job_id.trim().is_empty() || job_id.contains(':') {
            return Err(SpoolError::InvalidInput(
                "job id must be non-empty and must not contain ':'".to_string(),
            ));
        }

        let plan = decompose(&job_id, &request, &self.config.retry)?;
        let total_tasks = plan.total_tasks() as u32;
        let record = JobRecord {
            job_id: job_id.clone(),
            brief: request.brief.clone(),
            total_tasks,
            policy: plan.policy.clone(),
            test_mode: request.test_mode,
            created_at_ms: now_millis(),
        };

        self.store.create_job(&record).map_err(map_store)?;
        self.store
            .create_tasks(&job_id, &plan.tasks)
            .map_err(map_store)?;
        self.store.flush()?;

        info!(
            job_id = %job_id,
            total_tasks,
            test_mode = request.test_mode,
            "job started"
        );
        Ok(JobStarted {
            job_id,
            total_tasks,
            test_mode: request.test_mode,
        })
    }

    /// Aggregate counts for a job, recomputed from the store on every call.
    pub fn progress(&self, job_id: &JobId) -> Result<ProgressSnapshot, SpoolError> {
        self.require_job(job_id)?;
        let tasks = self.store.list_by_job(job_id)?;
        Ok(aggregate(&tasks))
    }

    /// Classify a job from its persisted tasks, typically on reconnect.
    pub fn check_resumability(&self, job_id: &JobId) -> Result<JobClassification, SpoolError> {
        self.require_job(job_id)?;
        let tasks = self.store.list_by_job(job_id)?;
        Ok(classify(&tasks))
    }

    /// Prepare an interrupted job to run again.
    ///
    /// Reports the classification as found, returns any task stranded in
    /// progress to the queue, and counts the queued backlog a following
    /// `run_job` will pick up. Completed tasks are never touched.
    pub fn resume_job(&self, job_id: &JobId) -> Result<ResumeReport, SpoolError> {
        self.require_job(job_id)?;
        let tasks = self.store.list_by_job(job_id)?;
        let classification = classify(&tasks);

        let requeued = requeue_stranded(self.store.as_ref(), job_id)?;
        let tasks = self.store.list_by_job(job_id)?;
        let submitted = resumable_tasks(&tasks).len() as u32;

        info!(
            job_id = %job_id,
            classification = %classification,
            requeued_stranded = requeued.len(),
            submitted,
            "resume prepared"
        );
        Ok(ResumeReport {
            classification,
            requeued_stranded: requeued.len() as u32,
            submitted,
        })
    }

    /// Operator reset of one failed task back to the queue.
    ///
    /// Only failed tasks qualify; the attempt history stays on the record.
    /// Follow with `resume_job` and `run_job` to actually re-execute it.
    pub fn retry_task(&self, job_id: &JobId, task_id: &TaskId) -> Result<(), SpoolError> {
        self.require_job(job_id)?;
        let task = self.require_task(task_id)?;
        if &task.job_id != job_id {
            return Err(SpoolError::TaskNotFound(task_id.clone()));
        }

        self.store.reset_to_queued(task_id).map_err(|err| match err {
            StoreError::InvalidTransition { from, .. } => SpoolError::NotRetryable {
                task_id: task_id.clone(),
                reason: format!("task is {}, only failed tasks can be reset", from),
            },
            other => map_store(other),
        })?;
        info!(job_id = %job_id, task_id = %task_id, "failed task reset to queued");
        Ok(())
    }

    /// Execute a job's queued tasks to a terminal state. See `JobRunner`.
    pub async fn run_job(
        &self,
        job_id: &JobId,
        cancel: &CancelToken,
    ) -> Result<RunReport, SpoolError> {
        self.runner.run_job(job_id, cancel).await
    }

    /// Poll progress until every task is terminal or the deadline passes.
    pub async fn wait_until_settled(
        &self,
        job_id: &JobId,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ProgressSnapshot, SpoolError> {
        let poll = Duration::from_millis(self.config.execution.poll_interval_ms);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.progress(job_id)?;
            if snapshot.is_settled() {
                return Ok(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SpoolError::SettleTimeout(job_id.clone()));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(SpoolError::Canceled),
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Job record lookup for presentation layers.
    pub fn job(&self, job_id: &JobId) -> Result<JobRecord, SpoolError> {
        self.require_job(job_id)
    }

    /// All task records of a job, in scheduler order.
    pub fn tasks(&self, job_id: &JobId) -> Result<Vec<TaskRecord>, SpoolError> {
        self.require_job(job_id)?;
        Ok(self.store.list_by_job(job_id)?)
    }

    /// All known jobs, newest first.
    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, SpoolError> {
        Ok(self.store.list_jobs()?)
    }

    /// Remove a job and its tasks. Returns false when the job was not found.
    pub fn delete_job(&self, job_id: &JobId) -> Result<bool, SpoolError> {
        let deleted = self.store.delete_job(job_id)?;
        if deleted {
            info!(job_id = %job_id, "job deleted");
        }
        Ok(deleted)
    }

    fn require_job(&self, job_id: &JobId) -> Result<JobRecord, SpoolError> {
        self.store
            .get_job(job_id)
            .map_err(map_store)?
            .ok_or_else(|| SpoolError::JobNotFound(job_id.clone()))
    }

    fn require_task(&self, task_id: &TaskId) -> Result<TaskRecord, SpoolError> {
        self.store
            .get_task(task_id)
            .map_err(map_store)?
            .ok_or_else(|| SpoolError::TaskNotFound(task_id.clone()))
    }
}

fn map_store(err: StoreError) -> SpoolError {
    match err {
        StoreError::JobNotFound(id) => SpoolError::JobNotFound(id),
        StoreError::TaskNotFound(id) => SpoolError::TaskNotFound(id),
        StoreError::JobExists(id) => {
            SpoolError::InvalidInput(format!("job {} already exists", id))
        }
        StoreError::InvalidKey(reason) => SpoolError::InvalidInput(reason),
        other => SpoolError::Storage(other),
    }
}
