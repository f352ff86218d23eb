//! CLI route: single route table and run context. Dispatches to the job API
//! and presentation.

use crate::api::JobApi;
use crate::config::ConfigLoader;
use crate::error::SpoolError;
use crate::generator::HttpGenerator;
use crate::plan::{CategoryWeight, ContentSpec, JobRequest, PinSpec, SlideSpec};
use crate::runner::{cancel_pair, RunReport};
use crate::store::SledTaskStore;
use crate::types::{new_job_id, JobId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::parse::Commands;

/// Runtime context for CLI execution: workspace, config path, and the job API.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    api: JobApi,
    workspace_root: PathBuf,
    #[allow(dead_code)]
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Reference to the underlying job API.
    pub fn api(&self) -> &JobApi {
        &self.api
    }

    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, SpoolError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SpoolError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;

        let store_path = config.storage.resolved_store_path(&workspace_root);
        let store = Arc::new(SledTaskStore::open(&store_path)?);
        let generator = Arc::new(HttpGenerator::new(
            &config.generator,
            config.execution.request_timeout(),
        )?);
        let api = JobApi::new(store, generator, config);

        Ok(Self {
            api,
            workspace_root,
            config_path,
        })
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, SpoolError> {
        match command {
            Commands::Init { force } => self.handle_init(*force),
            Commands::Start {
                job_id,
                brief,
                chapters,
                slides,
                lead_video,
                pins,
                categories,
                test_mode,
                format,
            } => self.handle_start(
                job_id.as_deref(),
                brief,
                *chapters,
                *slides,
                *lead_video,
                *pins,
                categories,
                *test_mode,
                format,
            ),
            Commands::Run { job_id, format } => self.handle_run(job_id, format),
            Commands::Progress {
                job_id,
                watch,
                timeout_secs,
                format,
            } => self.handle_progress(job_id, *watch, *timeout_secs, format),
            Commands::Status { job_id, format } => self.handle_status(job_id, format),
            Commands::Resume {
                job_id,
                no_run,
                format,
            } => self.handle_resume(job_id, *no_run, format),
            Commands::Retry { job_id, task_id } => self.handle_retry(job_id, task_id),
            Commands::Jobs { format } => self.handle_jobs(format),
            Commands::Tasks { job_id, format } => self.handle_tasks(job_id, format),
            Commands::Delete { job_id, force } => self.handle_delete(job_id, *force),
        }
    }

    fn handle_init(&self, force: bool) -> Result<String, SpoolError> {
        let report = crate::init::init_workspace(&self.workspace_root, force)?;
        Ok(super::format_init_report(
            &report,
            &self.workspace_root.display().to_string(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_start(
        &self,
        job_id: Option<&str>,
        brief: &str,
        chapters: Option<u32>,
        slides: Option<u32>,
        lead_video: bool,
        pins: Option<u32>,
        categories: &[String],
        test_mode: bool,
        format: &str,
    ) -> Result<String, SpoolError> {
        if lead_video && slides.is_none() {
            return Err(SpoolError::InvalidInput(
                "--lead-video requires --slides".to_string(),
            ));
        }
        if !categories.is_empty() && pins.is_none() {
            return Err(SpoolError::InvalidInput(
                "--category requires --pins".to_string(),
            ));
        }

        let request = JobRequest {
            brief: brief.to_string(),
            content: chapters.map(|chapters| ContentSpec { chapters }),
            slides: slides.map(|count| SlideSpec { count, lead_video }),
            pins: match pins {
                Some(total) => Some(PinSpec {
                    total,
                    categories: parse_categories(categories)?,
                }),
                None => None,
            },
            test_mode,
        };

        let job_id = job_id.map(str::to_string).unwrap_or_else(new_job_id);
        let started = self.api.start_job(job_id, request)?;
        Ok(match format {
            "json" => super::format_started_json(&started),
            _ => super::format_started_text(&started),
        })
    }

    fn handle_run(&self, job_id: &str, format: &str) -> Result<String, SpoolError> {
        let job_id = job_id.to_string();
        let report = self.run_with_ctrl_c(&job_id)?;
        Ok(match format {
            "json" => super::format_run_report_json(&job_id, &report),
            _ => super::format_run_report_text(&job_id, &report),
        })
    }

    fn handle_progress(
        &self,
        job_id: &str,
        watch: bool,
        timeout_secs: u64,
        format: &str,
    ) -> Result<String, SpoolError> {
        let job_id = job_id.to_string();
        let snapshot = if watch {
            let rt = runtime()?;
            rt.block_on(async {
                let (handle, token) = cancel_pair();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        handle.cancel();
                    }
                });
                self.api
                    .wait_until_settled(&job_id, Duration::from_secs(timeout_secs), &token)
                    .await
            })?
        } else {
            self.api.progress(&job_id)?
        };
        Ok(match format {
            "json" => super::format_progress_json(&job_id, &snapshot),
            _ => super::format_progress_text(&job_id, &snapshot),
        })
    }

    fn handle_status(&self, job_id: &str, format: &str) -> Result<String, SpoolError> {
        let job_id = job_id.to_string();
        let job = self.api.job(&job_id)?;
        let classification = self.api.check_resumability(&job_id)?;
        let snapshot = self.api.progress(&job_id)?;
        Ok(match format {
            "json" => super::format_status_json(&job, classification, &snapshot),
            _ => super::format_status_text(&job, classification, &snapshot),
        })
    }

    fn handle_resume(&self, job_id: &str, no_run: bool, format: &str) -> Result<String, SpoolError> {
        let job_id = job_id.to_string();
        let report = self.api.resume_job(&job_id)?;
        let run = if no_run {
            None
        } else {
            Some(self.run_with_ctrl_c(&job_id)?)
        };
        Ok(match format {
            "json" => super::format_resume_json(&job_id, &report, run.as_ref()),
            _ => {
                let mut out = super::format_resume_text(&job_id, &report);
                if let Some(ref run_report) = run {
                    out.push('\n');
                    out.push_str(&super::format_run_report_text(&job_id, run_report));
                } else {
                    out.push_str(&format!(
                        "\nExecute the backlog with 'spool run {}'.\n",
                        job_id
                    ));
                }
                out
            }
        })
    }

    fn handle_retry(&self, job_id: &str, task_id: &str) -> Result<String, SpoolError> {
        self.api
            .retry_task(&job_id.to_string(), &task_id.to_string())?;
        Ok(format!(
            "Task {} returned to the queue.\nRe-run the job with 'spool run {}'.",
            task_id, job_id
        ))
    }

    fn handle_jobs(&self, format: &str) -> Result<String, SpoolError> {
        let jobs = self.api.list_jobs()?;
        Ok(match format {
            "json" => super::format_jobs_json(&jobs),
            _ => super::format_jobs_text(&jobs),
        })
    }

    fn handle_tasks(&self, job_id: &str, format: &str) -> Result<String, SpoolError> {
        let job_id = job_id.to_string();
        let tasks = self.api.tasks(&job_id)?;
        Ok(match format {
            "json" => super::format_tasks_json(&job_id, &tasks),
            _ => super::format_tasks_text(&job_id, &tasks),
        })
    }

    fn handle_delete(&self, job_id: &str, force: bool) -> Result<String, SpoolError> {
        if !force {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete job '{}' and all of its tasks?", job_id))
                .interact()
                .map_err(|e| {
                    SpoolError::ConfigError(format!("Failed to get user input: {}", e))
                })?;

            if !confirmed {
                return Ok("Deletion cancelled".to_string());
            }
        }

        let job_id = job_id.to_string();
        if self.api.delete_job(&job_id)? {
            Ok(format!("Deleted job: {}", job_id))
        } else {
            Err(SpoolError::JobNotFound(job_id))
        }
    }

    /// Drive a job on a fresh runtime, cancelling cleanly on Ctrl-C.
    fn run_with_ctrl_c(&self, job_id: &JobId) -> Result<RunReport, SpoolError> {
        let rt = runtime()?;
        rt.block_on(async {
            let (handle, token) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });
            self.api.run_job(job_id, &token).await
        })
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, SpoolError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(SpoolError::ConfigError(
            "Cannot drive a job from within an async runtime context.".to_string(),
        ));
    }
    tokio::runtime::Runtime::new()
        .map_err(|e| SpoolError::ConfigError(format!("Failed to create runtime: {}", e)))
}

fn parse_categories(raw: &[String]) -> Result<Vec<CategoryWeight>, SpoolError> {
    raw.iter()
        .map(|spec| {
            let (name, weight) = spec.split_once('=').ok_or_else(|| {
                SpoolError::InvalidInput(format!(
                    "category '{}' must be of the form name=weight",
                    spec
                ))
            })?;
            let weight: f64 = weight.trim().parse().map_err(|_| {
                SpoolError::InvalidInput(format!("category '{}' has a non-numeric weight", spec))
            })?;
            Ok(CategoryWeight {
                category: name.trim().to_string(),
                weight,
            })
        })
        .collect()
}
