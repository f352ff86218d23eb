//! Spool: Deterministic Task Orchestration for Generation Jobs
//!
//! A planning and retry engine that decomposes briefs into generation tasks,
//! schedules them deterministically, and drives them to completion with
//! durable state and resumable execution.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod init;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod resume;
pub mod runner;
pub mod store;
pub mod types;
