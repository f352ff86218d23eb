//! Configuration System
//!
//! Layered configuration with file sources and environment overrides.
//! Precedence (lowest to highest): built-in defaults, the global config file
//! under the user config directory, `spool.toml` in the workspace root, then
//! `SPOOL_*` environment variables.

use crate::error::SpoolError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpoolConfig {
    /// Retry schedule applied to newly created jobs
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Execution windows and polling cadence
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Generation service connection settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backoff schedule and attempt ceiling for task retries.
///
/// The policy is snapshotted into each job at creation, so editing the
/// configured defaults never changes the behavior of a job already planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay in seconds served before each retry, starting with attempt 2.
    /// Attempts past the end of the list reuse the last entry.
    #[serde(default = "default_attempt_delays")]
    pub attempt_delays_secs: Vec<u64>,

    /// Maximum number of attempts per task, first attempt included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_attempt_delays() -> Vec<u64> {
    vec![5, 30, 120, 300, 300, 300]
}

fn default_max_attempts() -> u32 {
    7
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_delays_secs: default_attempt_delays(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Delay served before attempt `attempt` (1-based). The first attempt is
    /// never delayed.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.attempt_delays_secs.is_empty() {
            return Duration::ZERO;
        }
        let idx = ((attempt - 2) as usize).min(self.attempt_delays_secs.len() - 1);
        Duration::from_secs(self.attempt_delays_secs[idx])
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.attempt_delays_secs.is_empty() {
            return Err("attempt_delays_secs cannot be empty".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Execution window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound on a single generation request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Execution window a single task attempt must fit inside, in seconds
    #[serde(default = "default_task_window_secs")]
    pub task_window_secs: u64,

    /// Poll interval for settle-waits and progress watching, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_task_window_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            task_window_secs: default_task_window_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ExecutionConfig {
    /// Request timeout must leave headroom inside the task window, so a hung
    /// generation call can never outlive the window the task runs in.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".to_string());
        }
        if self.request_timeout_secs >= self.task_window_secs {
            return Err(format!(
                "request_timeout_secs ({}) must be shorter than task_window_secs ({})",
                self.request_timeout_secs, self.task_window_secs
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Endpoint the generation requests are posted to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key sent as a bearer token, if the service requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier forwarded with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// TCP connect timeout, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8743/v1/generate".to_string()
}

fn default_model() -> String {
    "asset-gen-1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!(
                "endpoint must start with http:// or https://, got '{}'",
                self.endpoint
            ));
        }
        if self.model.is_empty() {
            return Err("model cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Location of the embedded task database
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".spool/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_path.as_os_str().is_empty() {
            return Err("store_path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Store path resolved against a workspace root when relative.
    pub fn resolved_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Retry(String),
    Execution(String),
    Generator(String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Retry(msg) => write!(f, "Retry: {}", msg),
            ValidationError::Execution(msg) => write!(f, "Execution: {}", msg),
            ValidationError::Generator(msg) => write!(f, "Generator: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SpoolConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.retry.validate() {
            errors.push(ValidationError::Retry(e));
        }
        if let Err(e) = self.execution.validate() {
            errors.push(ValidationError::Execution(e));
        }
        if let Err(e) = self.generator.validate() {
            errors.push(ValidationError::Generator(e));
        }
        if let Err(e) = self.storage.validate() {
            errors.push(ValidationError::Storage(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load, validate, and convert errors for API consumers.
    pub fn load_validated(workspace_root: &Path) -> Result<Self, SpoolError> {
        let config = ConfigLoader::load(workspace_root)?;
        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SpoolError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}

/// Path to the global config file under the user config directory.
pub fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.config_dir()
            .join("spool")
            .join("config.toml")
    })
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.store_path", ".spool/store")?
        .set_default("logging.level", "info")
}

/// Layered configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<SpoolConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let canonical = global_path
                    .canonicalize()
                    .unwrap_or_else(|_| global_path.clone());
                builder = builder.add_source(File::from(canonical).required(false));
            }
        }

        let workspace_config = workspace_root.join("spool.toml");
        if workspace_config.exists() {
            builder = builder.add_source(File::from(workspace_config).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("SPOOL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from a single explicit file.
    pub fn load_from_file(path: &Path) -> Result<SpoolConfig, ConfigError> {
        let builder = builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        let config = builder.build()?;
        config.try_deserialize()
    }
}
