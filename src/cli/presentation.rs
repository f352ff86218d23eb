//! CLI presentation: text and json formatters per command family.

use crate::api::JobStarted;
use crate::init::InitReport;
use crate::progress::ProgressSnapshot;
use crate::resume::JobClassification;
use crate::resume::ResumeReport;
use crate::runner::RunReport;
use crate::store::{JobRecord, TaskRecord, TaskStatus};
use chrono::{TimeZone, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Format a section heading with bold/underline. Respects NO_COLOR and TTY.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_init_report(report: &InitReport, root_display: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Workspace initialized: {}\n", root_display));
    for entry in &report.created {
        out.push_str(&format!("  Created: {}\n", entry));
    }
    for entry in &report.skipped {
        out.push_str(&format!("  Skipped: {} (already present)\n", entry));
    }
    if !report.skipped.is_empty() {
        out.push_str("\nUse --force to overwrite the existing config file.\n");
    }
    out
}

pub fn format_started_text(started: &JobStarted) -> String {
    let mut out = format!("Job started: {}\n", started.job_id);
    out.push_str(&format!("  Tasks planned: {}\n", started.total_tasks));
    if started.test_mode {
        out.push_str("  Test mode: one task per enabled kind\n");
    }
    out.push_str(&format!(
        "\nExecute it with 'spool run {}'.\n",
        started.job_id
    ));
    out
}

pub fn format_started_json(started: &JobStarted) -> String {
    serde_json::to_string_pretty(started).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_run_report_text(job_id: &str, report: &RunReport) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Run finished"));
    out.push_str(&format!("  Job: {}\n", job_id));
    if report.completed_with_fallback > 0 {
        out.push_str(&format!(
            "  Completed: {} ({} with substitute content)\n",
            report.completed, report.completed_with_fallback
        ));
    } else {
        out.push_str(&format!("  Completed: {}\n", report.completed));
    }
    if report.failed > 0 {
        out.push_str(&format!(
            "  Failed: {}\n",
            report.failed.to_string().red()
        ));
    } else {
        out.push_str("  Failed: 0\n");
    }
    if report.canceled {
        out.push_str(&format!("  {}\n", "Interrupted by cancellation".yellow()));
        out.push_str(&format!(
            "\nPick the job back up with 'spool resume {}'.\n",
            job_id
        ));
    } else if report.failed > 0 {
        out.push_str(&format!(
            "\nInspect failures with 'spool tasks {}'.\n",
            job_id
        ));
    }
    out
}

pub fn format_run_report_json(job_id: &str, report: &RunReport) -> String {
    let out = json!({
        "job_id": job_id,
        "completed": report.completed,
        "completed_with_fallback": report.completed_with_fallback,
        "failed": report.failed,
        "canceled": report.canceled,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_progress_text(job_id: &str, snapshot: &ProgressSnapshot) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Progress"));
    out.push_str(&format!("  Job: {}\n", job_id));
    out.push_str(&format!(
        "  Completed: {}/{} ({}%)\n",
        snapshot.completed, snapshot.total, snapshot.percentage
    ));
    out.push_str(&format!("  In progress: {}\n", snapshot.in_progress));
    if snapshot.failed > 0 {
        out.push_str(&format!(
            "  Failed: {}\n",
            snapshot.failed.to_string().red()
        ));
    } else {
        out.push_str("  Failed: 0\n");
    }
    out.push_str(&format!("  Pending: {}\n", snapshot.pending));
    out
}

pub fn format_progress_json(job_id: &str, snapshot: &ProgressSnapshot) -> String {
    let out = json!({
        "job_id": job_id,
        "total": snapshot.total,
        "completed": snapshot.completed,
        "in_progress": snapshot.in_progress,
        "failed": snapshot.failed,
        "pending": snapshot.pending,
        "percentage": snapshot.percentage,
        "settled": snapshot.is_settled(),
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_status_text(
    job: &JobRecord,
    classification: JobClassification,
    snapshot: &ProgressSnapshot,
) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Job status"));
    out.push_str(&format!("  Job: {}\n", job.job_id));
    out.push_str(&format!("  Brief: {}\n", ellipsize(&job.brief, 60)));
    out.push_str(&format!(
        "  Classification: {}\n",
        colorize_classification(classification)
    ));
    out.push_str(&format!(
        "  Tasks: {} ({} completed, {} in progress, {} failed, {} pending)\n",
        snapshot.total, snapshot.completed, snapshot.in_progress, snapshot.failed, snapshot.pending
    ));
    out.push_str(&format!(
        "  Retry policy: {} attempts, delays {:?}s\n",
        job.policy.max_attempts, job.policy.attempt_delays_secs
    ));
    if job.test_mode {
        out.push_str("  Test mode: yes\n");
    }
    out.push_str(&format!(
        "  Created: {}\n",
        format_timestamp(job.created_at_ms)
    ));
    match classification {
        JobClassification::Interrupted => {
            out.push_str(&format!(
                "\nPick the job back up with 'spool resume {}'.\n",
                job.job_id
            ));
        }
        JobClassification::Failed => {
            out.push_str(&format!(
                "\nReset individual tasks with 'spool retry {} <task-id>'.\n",
                job.job_id
            ));
        }
        _ => {}
    }
    out
}

pub fn format_status_json(
    job: &JobRecord,
    classification: JobClassification,
    snapshot: &ProgressSnapshot,
) -> String {
    let out = json!({
        "job_id": job.job_id,
        "brief": job.brief,
        "classification": classification,
        "progress": snapshot,
        "policy": job.policy,
        "test_mode": job.test_mode,
        "created_at_ms": job.created_at_ms,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_resume_text(job_id: &str, report: &ResumeReport) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Resume"));
    out.push_str(&format!("  Job: {}\n", job_id));
    out.push_str(&format!(
        "  Found: {}\n",
        colorize_classification(report.classification)
    ));
    out.push_str(&format!(
        "  Stranded tasks requeued: {}\n",
        report.requeued_stranded
    ));
    out.push_str(&format!("  Tasks ready to run: {}\n", report.submitted));
    out
}

pub fn format_resume_json(
    job_id: &str,
    report: &ResumeReport,
    run: Option<&RunReport>,
) -> String {
    let out = json!({
        "job_id": job_id,
        "classification": report.classification,
        "requeued_stranded": report.requeued_stranded,
        "submitted": report.submitted,
        "run": run,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_jobs_text(jobs: &[JobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs found.\n\nUse 'spool start' to plan one.".to_string();
    }
    let mut out = format!("{}\n\n", format_section_heading("Jobs"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Job", "Brief", "Tasks", "Mode", "Created"]);
    for job in jobs {
        let mode = if job.test_mode { "test" } else { "full" };
        table.add_row(vec![
            job.job_id.clone(),
            ellipsize(&job.brief, 40),
            job.total_tasks.to_string(),
            mode.to_string(),
            format_timestamp(job.created_at_ms),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Total: {} job(s)\n", jobs.len()));
    out
}

pub fn format_jobs_json(jobs: &[JobRecord]) -> String {
    let out = json!({ "jobs": jobs, "total": jobs.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_tasks_text(job_id: &str, tasks: &[TaskRecord]) -> String {
    if tasks.is_empty() {
        return format!("No tasks found for job {}.", job_id);
    }
    let mut out = format!("{}\n\n", format_section_heading("Tasks"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Task", "Kind", "Pos", "Category", "Status", "Attempts", "Last error",
    ]);
    for task in tasks {
        table.add_row(vec![
            short_id(&task.task_id),
            task.kind.to_string(),
            task.position.to_string(),
            task.category.clone().unwrap_or_else(|| "-".to_string()),
            colorize_status(task.status),
            task.attempts.to_string(),
            task.last_error
                .as_deref()
                .map(|e| ellipsize(e, 40))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Total: {} task(s) for job {}\n",
        tasks.len(),
        job_id
    ));
    out
}

pub fn format_tasks_json(job_id: &str, tasks: &[TaskRecord]) -> String {
    let out = json!({ "job_id": job_id, "tasks": tasks, "total": tasks.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

fn colorize_status(status: TaskStatus) -> String {
    match status {
        TaskStatus::Completed => status.as_str().green().to_string(),
        TaskStatus::Failed => status.as_str().red().to_string(),
        TaskStatus::InProgress => status.as_str().yellow().to_string(),
        TaskStatus::Queued => status.as_str().to_string(),
    }
}

fn colorize_classification(classification: JobClassification) -> String {
    match classification {
        JobClassification::Completed => classification.as_str().green().to_string(),
        JobClassification::Failed => classification.as_str().red().to_string(),
        JobClassification::InProgress | JobClassification::Interrupted => {
            classification.as_str().yellow().to_string()
        }
        JobClassification::NotStarted => classification.as_str().to_string(),
    }
}

fn format_timestamp(ms: u64) -> String {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn short_id(task_id: &str) -> String {
    task_id.chars().take(12).collect()
}

fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", truncated)
}
