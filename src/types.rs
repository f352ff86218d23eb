//! Shared identifier, kind, and clock primitives.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Caller-supplied job identifier.
pub type JobId = String;

/// Deterministic task identifier, hex-encoded blake3.
pub type TaskId = String;

static JOB_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Kind of asset a task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Chapter,
    Slide,
    Video,
    Pin,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Chapter => "chapter",
            TaskKind::Slide => "slide",
            TaskKind::Video => "video",
            TaskKind::Pin => "pin",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute a task id from its identity fields.
///
/// TaskId = hex(blake3(job_id || kind || position))
///
/// Ids depend only on the job id, kind, and per-kind position, so planning
/// the same request twice yields the same ids and re-submission after an
/// interruption addresses the same records.
pub fn compute_task_id(job_id: &str, kind: TaskKind, position: u32) -> TaskId {
    let mut hasher = Hasher::new();
    hasher.update(b"job:");
    hasher.update(job_id.as_bytes());
    hasher.update(b"kind:");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"position:");
    hasher.update(&position.to_be_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a fresh job id for callers that do not supply one.
pub fn new_job_id() -> JobId {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("job-{ts}-{pid}-{seq}")
}
