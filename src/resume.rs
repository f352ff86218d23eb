//! Resume classification and reconnect reconciliation.
//!
//! A job is classified purely from its persisted task records, so any process
//! can pick up after an interruption by reading the store. Resuming re-submits
//! only work that never finished; completed tasks are never re-executed, which
//! is what keeps the external collaborator from being billed twice.

use crate::error::StoreError;
use crate::store::{TaskRecord, TaskStatus, TaskStore};
use crate::types::{JobId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Where a job stands, derived from its task records alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClassification {
    /// No tasks were ever persisted for this job.
    NotStarted,
    /// Every task completed.
    Completed,
    /// At least one task is marked in progress, so a run may still be live.
    InProgress,
    /// No run is live and at least one task exhausted its attempts.
    Failed,
    /// No run is live, nothing failed, and queued work remains. The process
    /// stopped between tasks.
    Interrupted,
}

impl JobClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobClassification::NotStarted => "not_started",
            JobClassification::Completed => "completed",
            JobClassification::InProgress => "in_progress",
            JobClassification::Failed => "failed",
            JobClassification::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for JobClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a resume call did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeReport {
    pub classification: JobClassification,
    /// Tasks found stranded in progress and returned to the queue.
    pub requeued_stranded: u32,
    /// Queued tasks handed to the runner.
    pub submitted: u32,
}

/// Classify a job from all of its task records.
///
/// Precedence mirrors how an operator reads the board: an empty board is not
/// started; a full board is done; live work trumps failures; failures trump
/// a quiet backlog.
pub fn classify(tasks: &[TaskRecord]) -> JobClassification {
    if tasks.is_empty() {
        return JobClassification::NotStarted;
    }

    let total = tasks.len();
    let mut completed = 0usize;
    let mut in_progress = 0usize;
    let mut failed = 0usize;
    for task in tasks {
        match task.status {
            TaskStatus::Completed => completed += 1,
            TaskStatus::InProgress => in_progress += 1,
            TaskStatus::Failed => failed += 1,
            TaskStatus::Queued => {}
        }
    }

    if completed == total {
        JobClassification::Completed
    } else if in_progress > 0 {
        JobClassification::InProgress
    } else if failed > 0 {
        JobClassification::Failed
    } else {
        JobClassification::Interrupted
    }
}

/// The tasks a resume will hand back to the runner: everything still queued,
/// in scheduler order.
pub fn resumable_tasks(tasks: &[TaskRecord]) -> Vec<TaskId> {
    tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Queued)
        .map(|task| task.task_id.clone())
        .collect()
}

/// Return tasks stranded in progress by a dead process to the queue.
///
/// Only one writer touches a task's status at a time, so by the time a caller
/// reconnects and asks to resume, an in-progress marker with no live run
/// behind it can only be a leftover. The attempt it consumed stays counted;
/// the collaborator may have been invoked before the interruption.
pub fn requeue_stranded(store: &dyn TaskStore, job_id: &JobId) -> Result<Vec<TaskId>, StoreError> {
    let mut requeued = Vec::new();
    for task in store.list_by_job(job_id)? {
        if task.status == TaskStatus::InProgress {
            store.set_status(
                &task.task_id,
                TaskStatus::Queued,
                Some("process interrupted mid-attempt".to_string()),
            )?;
            requeued.push(task.task_id);
        }
    }
    if !requeued.is_empty() {
        info!(
            job_id = %job_id,
            count = requeued.len(),
            "requeued tasks stranded in progress"
        );
    }
    Ok(requeued)
}
