//! Task State Store
//!
//! Durable, keyed records of job and task lifecycle state. The store is the
//! single source of truth: progress views and resume classification are
//! always derived from it, never cached.

pub mod persistence;

pub use persistence::SledTaskStore;

use crate::config::RetryPolicy;
use crate::error::StoreError;
use crate::plan::TaskSpec;
use crate::types::{JobId, TaskId, TaskKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated generation job. Created once; never mutated after its
/// tasks exist. Overall status is always derived from the task records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub brief: String,
    pub total_tasks: u32,
    /// Retry policy snapshot taken at creation. Editing the configured
    /// defaults never changes a job already planned.
    pub policy: RetryPolicy,
    pub test_mode: bool,
    pub created_at_ms: u64,
}

/// One unit of generation work.
///
/// `attempts` counts how many times the task has entered `in_progress`.
/// `updated_at_ms` doubles as the last-attempt timestamp the retry delay is
/// re-derived from, so a restart mid-delay resumes with only the remaining
/// wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub job_id: JobId,
    pub kind: TaskKind,
    pub category: Option<String>,
    pub variation: Option<u8>,
    pub position: u32,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Task State Store interface.
///
/// Transition guards live here, not in callers: `in_progress` only from
/// `queued` (and increments the attempt count), `completed` and `queued`
/// (retry) only from `in_progress`, `failed` only from `in_progress` and only
/// once attempts have reached the owning job's snapshotted maximum.
/// Re-applying the current terminal status is a no-op, never an error.
pub trait TaskStore: Send + Sync {
    /// Persist a new job record. Fails if the job id is already taken.
    fn create_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// All jobs, newest first.
    fn list_jobs(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Delete a job and every task it owns. Returns false if the job did not
    /// exist.
    fn delete_job(&self, job_id: &str) -> Result<bool, StoreError>;

    /// Persist task specs as `queued` records in the given order.
    ///
    /// Task ids are deterministic, so re-submitting an identical plan skips
    /// records that already exist instead of duplicating them. Returns the
    /// task ids in spec order.
    fn create_tasks(&self, job_id: &str, specs: &[TaskSpec]) -> Result<Vec<TaskId>, StoreError>;

    fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// All tasks of a job in scheduler order.
    fn list_by_job(&self, job_id: &str) -> Result<Vec<TaskRecord>, StoreError>;

    /// Apply a guarded status transition and return the updated record.
    fn set_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<TaskRecord, StoreError>;

    /// Operator reset of one `failed` task back to `queued`. Clears the
    /// recorded error; the attempt count is preserved.
    fn reset_to_queued(&self, task_id: &str) -> Result<TaskRecord, StoreError>;

    fn flush(&self) -> Result<(), StoreError>;
}
