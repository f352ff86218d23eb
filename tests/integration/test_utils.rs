//! Shared fixtures for integration tests
//!
//! Provides a scripted generation collaborator and store/api constructors so
//! the suites exercise real persistence end to end without touching the
//! network.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use spool::api::JobApi;
use spool::config::{RetryPolicy, SpoolConfig};
use spool::generator::{GenerateError, GeneratedAsset, Generator};
use spool::plan::{CategoryWeight, ContentSpec, JobRequest, PinSpec, SlideSpec};
use spool::store::SledTaskStore;
use spool::types::TaskKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Generation stand-in that fails each distinct task a fixed number of times
/// before succeeding, counting every call it receives.
pub struct CountingGenerator {
    failures_per_task: u32,
    calls: AtomicU32,
    seen: Mutex<HashMap<String, u32>>,
}

impl CountingGenerator {
    /// Succeeds on every call.
    pub fn reliable() -> Self {
        Self::flaky(0)
    }

    /// Fails each task `failures_per_task` times with a transient error, then
    /// succeeds.
    pub fn flaky(failures_per_task: u32) -> Self {
        Self {
            failures_per_task,
            calls: AtomicU32::new(0),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Total generation calls observed, across all tasks and attempts.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(
        &self,
        kind: TaskKind,
        payload: &Value,
    ) -> Result<GeneratedAsset, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut seen = self.seen.lock();
            let failures = seen.entry(payload.to_string()).or_insert(0);
            if *failures < self.failures_per_task {
                *failures += 1;
                return Err(GenerateError::Transient {
                    message: "synthetic outage".to_string(),
                });
            }
        }
        Ok(GeneratedAsset {
            content: format!("generated {}", kind),
            media_url: if kind == TaskKind::Video || kind == TaskKind::Slide {
                Some("https://cdn.example/asset.bin".to_string())
            } else {
                None
            },
            model: "mock".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Config with a zero-delay retry schedule and a tight poll interval so runs
/// settle without real waiting.
pub fn fast_config(max_attempts: u32) -> SpoolConfig {
    let mut config = SpoolConfig::default();
    config.retry = RetryPolicy {
        attempt_delays_secs: vec![0],
        max_attempts,
    };
    config.execution.request_timeout_secs = 5;
    config.execution.poll_interval_ms = 10;
    config
}

/// Open a store under the temp dir and wrap it in an api.
pub fn open_api(
    dir: &TempDir,
    generator: Arc<dyn Generator>,
    config: SpoolConfig,
) -> (JobApi, Arc<SledTaskStore>) {
    let store = Arc::new(SledTaskStore::open(dir.path().join("store")).unwrap());
    let api = JobApi::new(store.clone(), generator, config);
    (api, store)
}

/// The reference request: 14 chapters, a 10-slide deck led by a video, and 32
/// pins split across six weighted categories.
pub fn reference_request() -> JobRequest {
    JobRequest {
        brief: "container gardening on small balconies".to_string(),
        content: Some(ContentSpec { chapters: 14 }),
        slides: Some(SlideSpec {
            count: 10,
            lead_video: true,
        }),
        pins: Some(PinSpec {
            total: 32,
            categories: reference_categories(),
        }),
        test_mode: false,
    }
}

/// Weights whose exact split of 32 is 9, 8, 5, 4, 3, 3.
pub fn reference_categories() -> Vec<CategoryWeight> {
    [
        ("quotes", 27.0),
        ("tips", 26.0),
        ("howto", 16.0),
        ("stats", 14.0),
        ("myths", 10.0),
        ("stories", 8.0),
    ]
    .iter()
    .map(|(category, weight)| CategoryWeight {
        category: (*category).to_string(),
        weight: *weight,
    })
    .collect()
}

/// A chapters-only request, for suites that want a flat task list.
pub fn chapters_request(chapters: u32) -> JobRequest {
    JobRequest {
        brief: "field notes on sourdough".to_string(),
        content: Some(ContentSpec { chapters }),
        slides: None,
        pins: None,
        test_mode: false,
    }
}
