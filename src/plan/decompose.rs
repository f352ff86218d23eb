//! Task decomposition: one job request into a flat, ordered list of task
//! specifications.

use crate::config::RetryPolicy;
use crate::error::SpoolError;
use crate::plan::distribution::{plan_distribution, validate_weights, CategoryWeight};
use crate::plan::interleave::{interleave, CategoryQuota};
use crate::types::{compute_task_id, JobId, TaskId, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Content product decomposition request.
///
/// The chapter count is a product constant chosen so one chapter's expected
/// generation latency fits inside a bounded execution window. It is never
/// derived from content length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpec {
    pub chapters: u32,
}

/// Slide deck decomposition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub count: u32,
    /// Convert the slide at position 1 into a short video. The remaining
    /// image slides shift so deck positions stay a contiguous 1..N sequence.
    #[serde(default)]
    pub lead_video: bool,
}

/// Weighted pin set decomposition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinSpec {
    pub total: u32,
    pub categories: Vec<CategoryWeight>,
}

/// One user-initiated generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Topic carried into every task payload.
    pub brief: String,

    #[serde(default)]
    pub content: Option<ContentSpec>,

    #[serde(default)]
    pub slides: Option<SlideSpec>,

    #[serde(default)]
    pub pins: Option<PinSpec>,

    /// Collapse the job to one task per enabled kind, bypassing category
    /// distribution. Cheap end-to-end verification.
    #[serde(default)]
    pub test_mode: bool,
}

impl JobRequest {
    pub fn enabled_kinds(&self) -> usize {
        usize::from(self.content.is_some())
            + usize::from(self.slides.is_some())
            + usize::from(self.pins.is_some())
    }
}

/// One planned unit of generation work. Pure planning output; no lifecycle
/// state attached yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub category: Option<String>,
    pub variation: Option<u8>,
    /// 1-based position. Chapters and pins number their own sequences; slide
    /// and video tasks share one deck-position sequence.
    pub position: u32,
    pub payload: serde_json::Value,
}

/// An ordered task list plus the retry policy snapshot the job will run
/// under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPlan {
    pub job_id: JobId,
    pub policy: RetryPolicy,
    pub tasks: Vec<TaskSpec>,
}

impl JobPlan {
    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// Decompose a job request into an ordered task list.
///
/// Kinds are laid out chapters first, then the slide deck, then interleaved
/// pins. Task ids derive from the job id, kind, and position, so planning the
/// same request twice produces identical ids.
pub fn decompose(
    job_id: &str,
    request: &JobRequest,
    policy: &RetryPolicy,
) -> Result<JobPlan, SpoolError> {
    if request.brief.trim().is_empty() {
        return Err(SpoolError::InvalidInput("brief cannot be empty".to_string()));
    }
    if request.enabled_kinds() == 0 {
        return Err(SpoolError::InvalidInput(
            "request enables no task kind".to_string(),
        ));
    }

    let mut tasks = Vec::new();

    if let Some(content) = &request.content {
        plan_chapters(job_id, request, content, &mut tasks)?;
    }
    if let Some(slides) = &request.slides {
        plan_slides(job_id, request, slides, &mut tasks)?;
    }
    if let Some(pins) = &request.pins {
        plan_pins(job_id, request, pins, &mut tasks)?;
    }

    if tasks.is_empty() {
        return Err(SpoolError::InvalidInput(
            "request produces no tasks".to_string(),
        ));
    }

    Ok(JobPlan {
        job_id: job_id.to_string(),
        policy: policy.clone(),
        tasks,
    })
}

fn plan_chapters(
    job_id: &str,
    request: &JobRequest,
    content: &ContentSpec,
    tasks: &mut Vec<TaskSpec>,
) -> Result<(), SpoolError> {
    if content.chapters == 0 {
        return Err(SpoolError::InvalidInput(
            "chapter count must be positive".to_string(),
        ));
    }
    let count = if request.test_mode { 1 } else { content.chapters };
    for position in 1..=count {
        tasks.push(TaskSpec {
            task_id: compute_task_id(job_id, TaskKind::Chapter, position),
            kind: TaskKind::Chapter,
            category: None,
            variation: None,
            position,
            payload: json!({
                "brief": request.brief,
                "chapter": position,
                "chapter_count": count,
            }),
        });
    }
    Ok(())
}

fn plan_slides(
    job_id: &str,
    request: &JobRequest,
    slides: &SlideSpec,
    tasks: &mut Vec<TaskSpec>,
) -> Result<(), SpoolError> {
    if slides.count == 0 {
        return Err(SpoolError::InvalidInput(
            "slide count must be positive".to_string(),
        ));
    }
    let count = if request.test_mode { 1 } else { slides.count };
    for position in 1..=count {
        let kind = if slides.lead_video && position == 1 {
            TaskKind::Video
        } else {
            TaskKind::Slide
        };
        let format = if kind == TaskKind::Video { "video" } else { "image" };
        tasks.push(TaskSpec {
            task_id: compute_task_id(job_id, kind, position),
            kind,
            category: None,
            variation: None,
            position,
            payload: json!({
                "brief": request.brief,
                "slide": position,
                "slide_count": count,
                "format": format,
            }),
        });
    }
    Ok(())
}

fn plan_pins(
    job_id: &str,
    request: &JobRequest,
    pins: &PinSpec,
    tasks: &mut Vec<TaskSpec>,
) -> Result<(), SpoolError> {
    validate_weights(&pins.categories)?;

    if request.test_mode {
        // Distribution is bypassed; the single probe task takes the first
        // category at variation 1.
        let category = pins.categories[0].category.clone();
        tasks.push(pin_spec(job_id, request, category, 1, 1));
        return Ok(());
    }

    let counts = plan_distribution(pins.total, &pins.categories)?;
    let quotas: Vec<CategoryQuota> = counts.into_iter().map(CategoryQuota::from).collect();
    let slots = interleave(quotas);

    for (idx, slot) in slots.into_iter().enumerate() {
        let position = idx as u32 + 1;
        tasks.push(pin_spec(job_id, request, slot.category, slot.variation, position));
    }
    Ok(())
}

fn pin_spec(
    job_id: &str,
    request: &JobRequest,
    category: String,
    variation: u8,
    position: u32,
) -> TaskSpec {
    TaskSpec {
        task_id: compute_task_id(job_id, TaskKind::Pin, position),
        kind: TaskKind::Pin,
        category: Some(category.clone()),
        variation: Some(variation),
        position,
        payload: json!({
            "brief": request.brief,
            "category": category,
            "variation": variation,
        }),
    }
}
