//! Progress aggregation.
//!
//! A snapshot is a pure function of a job's task records at one instant.
//! Nothing here caches or writes; callers re-aggregate on every poll so the
//! numbers can never drift from the store.

use crate::store::{TaskRecord, TaskStatus};
use serde::{Deserialize, Serialize};

/// Aggregate counts for one job.
///
/// `pending` is what remains queued: `total - completed - in_progress - failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub failed: u32,
    pub pending: u32,
    pub percentage: u8,
}

impl ProgressSnapshot {
    /// True once no task can change state without outside intervention.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

/// Compute a snapshot from all tasks of one job.
pub fn aggregate(tasks: &[TaskRecord]) -> ProgressSnapshot {
    let total = tasks.len() as u32;
    let mut completed = 0u32;
    let mut in_progress = 0u32;
    let mut failed = 0u32;

    for task in tasks {
        match task.status {
            TaskStatus::Completed => completed += 1,
            TaskStatus::InProgress => in_progress += 1,
            TaskStatus::Failed => failed += 1,
            TaskStatus::Queued => {}
        }
    }

    let pending = total - completed - in_progress - failed;
    let percentage = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    };

    ProgressSnapshot {
        total,
        completed,
        in_progress,
        failed,
        pending,
        percentage,
    }
}
