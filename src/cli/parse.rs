//! CLI parse: clap types for Spool. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spool CLI - Resumable task orchestration for AI-generation jobs
#[derive(Parser)]
#[command(name = "spool")]
#[command(about = "Resumable task orchestration and retry engine for AI-generation jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a workspace (config file and data directory)
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Plan a job and persist its tasks, ready to run
    Start {
        /// Job identifier (generated when omitted)
        job_id: Option<String>,
        /// Topic carried into every task payload
        #[arg(long)]
        brief: String,
        /// Plan this many content chapters
        #[arg(long)]
        chapters: Option<u32>,
        /// Plan a slide deck of this many slides
        #[arg(long)]
        slides: Option<u32>,
        /// Convert the first slide into a short video
        #[arg(long)]
        lead_video: bool,
        /// Plan this many pins spread across the weighted categories
        #[arg(long)]
        pins: Option<u32>,
        /// Pin category as name=weight (repeatable)
        #[arg(long = "category", value_name = "NAME=WEIGHT")]
        categories: Vec<String>,
        /// Collapse to one task per enabled kind for cheap verification
        #[arg(long)]
        test_mode: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Execute a job's queued tasks until every one is terminal
    Run {
        /// Job identifier
        job_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show aggregate progress counts for a job
    Progress {
        /// Job identifier
        job_id: String,
        /// Keep polling until every task is terminal
        #[arg(long)]
        watch: bool,
        /// Give up watching after this many seconds
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Classify a job from its persisted state
    Status {
        /// Job identifier
        job_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Return stranded tasks to the queue and run the remaining backlog
    Resume {
        /// Job identifier
        job_id: String,
        /// Prepare only; report what a run would pick up without executing
        #[arg(long)]
        no_run: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reset one failed task back to the queue
    Retry {
        /// Job identifier
        job_id: String,
        /// Task identifier (hex)
        task_id: String,
    },
    /// List all jobs, newest first
    Jobs {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the tasks of a job in scheduler order
    Tasks {
        /// Job identifier
        job_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete a job and every task it owns
    Delete {
        /// Job identifier
        job_id: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}
