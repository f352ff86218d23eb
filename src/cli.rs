//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the job API.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_init_report, format_jobs_json, format_jobs_text, format_progress_json,
    format_progress_text, format_resume_json, format_resume_text, format_run_report_json,
    format_run_report_text, format_section_heading, format_started_json, format_started_text,
    format_status_json, format_status_text, format_tasks_json, format_tasks_text,
};
pub use route::RunContext;
