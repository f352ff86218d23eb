//! Error types for the task orchestration engine.

use crate::types::{JobId, TaskId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Job already exists: {0}")]
    JobExists(JobId),

    #[error("Invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: &'static str,
        to: &'static str,
    },

    #[error(
        "Task {task_id} cannot fail at {attempts}/{max_attempts} attempts; \
         transient failures route back to queued until attempts are exhausted"
    )]
    EarlyFailure {
        task_id: TaskId,
        attempts: u32,
        max_attempts: u32,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced to consumers of the orchestration API
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {task_id} is not retryable: {reason}")]
    NotRetryable { task_id: TaskId, reason: String },

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Timed out waiting for job {0} to settle")]
    SettleTimeout(JobId),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for SpoolError {
    fn from(err: config::ConfigError) -> Self {
        SpoolError::ConfigError(err.to_string())
    }
}
