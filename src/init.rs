//! Workspace initialization for the `spool init` command.
//!
//! Lays down a starter `spool.toml` holding the full default configuration and
//! the `.spool/` data directory the store and log file live under. Existing
//! files are left alone unless `force` is set.

use crate::config::SpoolConfig;
use crate::error::SpoolError;
use std::path::Path;

pub const WORKSPACE_CONFIG_FILE: &str = "spool.toml";
pub const DATA_DIR: &str = ".spool";

/// What initialization created and what it left untouched.
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Initialize a workspace rooted at `root`.
pub fn init_workspace(root: &Path, force: bool) -> Result<InitReport, SpoolError> {
    let mut report = InitReport::default();

    let data_dir = root.join(DATA_DIR);
    if data_dir.is_dir() {
        report.skipped.push(format!("{}/", DATA_DIR));
    } else {
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| SpoolError::ConfigError(format!("failed to create {}: {}", data_dir.display(), e)))?;
        report.created.push(format!("{}/", DATA_DIR));
    }

    let config_path = root.join(WORKSPACE_CONFIG_FILE);
    if config_path.exists() && !force {
        report.skipped.push(WORKSPACE_CONFIG_FILE.to_string());
        return Ok(report);
    }

    let defaults = SpoolConfig::default();
    let content = toml::to_string_pretty(&defaults)
        .map_err(|e| SpoolError::ConfigError(format!("failed to serialize defaults: {}", e)))?;
    std::fs::write(&config_path, content)
        .map_err(|e| SpoolError::ConfigError(format!("failed to write {}: {}", config_path.display(), e)))?;
    report.created.push(WORKSPACE_CONFIG_FILE.to_string());

    Ok(report)
}
