//! Sled-backed implementation of the Task State Store.
//!
//! Layout: a `jobs` tree keyed by job id, a `tasks` tree keyed by
//! `{job_id}:{seq}` with the sequence zero-padded so a prefix scan returns
//! tasks in scheduler order, and a `task_index` tree mapping task id to task
//! key for O(1) id lookups. Records are JSON-encoded.

use crate::error::StoreError;
use crate::plan::TaskSpec;
use crate::store::{JobRecord, TaskRecord, TaskStatus, TaskStore};
use crate::types::{now_millis, TaskId};
use sled::{Db, Tree};
use std::path::Path;

const TREE_JOBS: &str = "jobs";
const TREE_TASKS: &str = "tasks";
const TREE_TASK_INDEX: &str = "task_index";
const TASK_KEY_PAD: usize = 6;

pub struct SledTaskStore {
    db: Db,
    jobs: Tree,
    tasks: Tree,
    task_index: Tree,
}

impl SledTaskStore {
    /// Open (or create) a task store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let jobs = db.open_tree(TREE_JOBS)?;
        let tasks = db.open_tree(TREE_TASKS)?;
        let task_index = db.open_tree(TREE_TASK_INDEX)?;
        Ok(Self {
            db,
            jobs,
            tasks,
            task_index,
        })
    }

    fn encode_task_key(job_id: &str, seq: u64) -> String {
        format!("{job_id}:{seq:0TASK_KEY_PAD$}")
    }

    fn task_key(&self, task_id: &str) -> Result<Vec<u8>, StoreError> {
        self.task_index
            .get(task_id.as_bytes())?
            .map(|v| v.to_vec())
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
    }

    fn read_task(&self, key: &[u8]) -> Result<TaskRecord, StoreError> {
        let raw = self
            .tasks
            .get(key)?
            .ok_or_else(|| StoreError::InvalidKey(String::from_utf8_lossy(key).into_owned()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn write_task(&self, key: &[u8], record: &TaskRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record)?;
        self.tasks.insert(key, value)?;
        Ok(())
    }

    fn job_task_count(&self, job_id: &str) -> Result<u64, StoreError> {
        let prefix = format!("{job_id}:");
        let mut count = 0u64;
        for entry in self.tasks.scan_prefix(prefix.as_bytes()) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Max attempts snapshotted into the task's owning job.
    fn max_attempts_for(&self, record: &TaskRecord) -> Result<u32, StoreError> {
        let job = self
            .get_job(&record.job_id)?
            .ok_or_else(|| StoreError::JobNotFound(record.job_id.clone()))?;
        Ok(job.policy.max_attempts)
    }
}

impl TaskStore for SledTaskStore {
    fn create_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        if job.job_id.is_empty() || job.job_id.contains(':') {
            // Task keys are "{job_id}:{seq}"; a colon in the id would corrupt
            // prefix scans.
            return Err(StoreError::InvalidKey(format!(
                "job id '{}' must be non-empty and contain no ':'",
                job.job_id
            )));
        }
        if self.jobs.contains_key(job.job_id.as_bytes())? {
            return Err(StoreError::JobExists(job.job_id.clone()));
        }
        let value = serde_json::to_vec(job)?;
        self.jobs.insert(job.job_id.as_bytes(), value)?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let Some(raw) = self.jobs.get(job_id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    fn list_jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut out = Vec::new();
        for entry in self.jobs.iter() {
            let (_, value) = entry?;
            let record: JobRecord = serde_json::from_slice(&value)?;
            out.push(record);
        }
        out.sort_by_key(|j| std::cmp::Reverse(j.created_at_ms));
        Ok(out)
    }

    fn delete_job(&self, job_id: &str) -> Result<bool, StoreError> {
        if self.jobs.remove(job_id.as_bytes())?.is_none() {
            return Ok(false);
        }

        let prefix = format!("{job_id}:");
        let mut task_batch = sled::Batch::default();
        let mut index_batch = sled::Batch::default();
        for entry in self.tasks.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let record: TaskRecord = serde_json::from_slice(&value)?;
            task_batch.remove(key);
            index_batch.remove(record.task_id.as_bytes());
        }
        self.tasks.apply_batch(task_batch)?;
        self.task_index.apply_batch(index_batch)?;
        Ok(true)
    }

    fn create_tasks(&self, job_id: &str, specs: &[TaskSpec]) -> Result<Vec<TaskId>, StoreError> {
        if !self.jobs.contains_key(job_id.as_bytes())? {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }

        let mut next_seq = self.job_task_count(job_id)?;
        let mut task_batch = sled::Batch::default();
        let mut index_batch = sled::Batch::default();
        let mut task_ids = Vec::with_capacity(specs.len());
        let now = now_millis();

        for spec in specs {
            task_ids.push(spec.task_id.clone());

            // Deterministic ids make re-submission of an identical plan a
            // no-op for records that already exist.
            if self.task_index.contains_key(spec.task_id.as_bytes())? {
                continue;
            }

            let key = Self::encode_task_key(job_id, next_seq);
            next_seq += 1;

            let record = TaskRecord {
                task_id: spec.task_id.clone(),
                job_id: job_id.to_string(),
                kind: spec.kind,
                category: spec.category.clone(),
                variation: spec.variation,
                position: spec.position,
                payload: spec.payload.clone(),
                status: TaskStatus::Queued,
                attempts: 0,
                last_error: None,
                created_at_ms: now,
                updated_at_ms: now,
            };
            task_batch.insert(key.as_bytes(), serde_json::to_vec(&record)?);
            index_batch.insert(spec.task_id.as_bytes(), key.as_bytes());
        }

        self.tasks.apply_batch(task_batch)?;
        self.task_index.apply_batch(index_batch)?;
        Ok(task_ids)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let Some(key) = self.task_index.get(task_id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(self.read_task(&key)?))
    }

    fn list_by_job(&self, job_id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        let prefix = format!("{job_id}:");
        let mut out = Vec::new();
        for entry in self.tasks.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            let record: TaskRecord = serde_json::from_slice(&value)?;
            out.push(record);
        }
        Ok(out)
    }

    fn set_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<TaskRecord, StoreError> {
        let key = self.task_key(task_id)?;
        let mut record = self.read_task(&key)?;

        // Re-applying the current terminal status is a no-op so duplicate
        // writes after a crash are safe.
        if record.status == status && status.is_terminal() {
            return Ok(record);
        }

        match (record.status, status) {
            (TaskStatus::Queued, TaskStatus::InProgress) => {
                record.attempts += 1;
            }
            (TaskStatus::InProgress, TaskStatus::Completed) => {}
            (TaskStatus::InProgress, TaskStatus::Queued) => {}
            (TaskStatus::InProgress, TaskStatus::Failed) => {
                let max_attempts = self.max_attempts_for(&record)?;
                if record.attempts < max_attempts {
                    return Err(StoreError::EarlyFailure {
                        task_id: record.task_id,
                        attempts: record.attempts,
                        max_attempts,
                    });
                }
            }
            (from, to) => {
                return Err(StoreError::InvalidTransition {
                    task_id: record.task_id,
                    from: from.as_str(),
                    to: to.as_str(),
                });
            }
        }

        record.status = status;
        if status == TaskStatus::Completed {
            record.last_error = None;
        } else if error.is_some() {
            record.last_error = error;
        }
        record.updated_at_ms = now_millis();
        self.write_task(&key, &record)?;
        Ok(record)
    }

    fn reset_to_queued(&self, task_id: &str) -> Result<TaskRecord, StoreError> {
        let key = self.task_key(task_id)?;
        let mut record = self.read_task(&key)?;

        if record.status != TaskStatus::Failed {
            return Err(StoreError::InvalidTransition {
                task_id: record.task_id,
                from: record.status.as_str(),
                to: "queued",
            });
        }

        record.status = TaskStatus::Queued;
        record.last_error = None;
        record.updated_at_ms = now_millis();
        self.write_task(&key, &record)?;
        Ok(record)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
