//! Configuration for prebake
//!
//! Settings load from environment variables with sensible defaults and can be
//! overridden per-invocation from the CLI.
//!
//! # Environment Variables
//!
//! - `PREBAKE_CACHE_DIR`: dependency cache directory - default: system temp dir + "prebake-cache"
//! - `PREBAKE_WORK_DIR`: scratch directory for stage outputs - default: cache dir + "work"
//! - `PREBAKE_JOBS`: max parallel dependency compilations - default: "4"
//! - `PREBAKE_STAGE_TIMEOUT`: per-stage timeout in seconds - default: "300"
//! - `PREBAKE_LOG_LEVEL`: logging level - default: "info"
//! - `PREBAKE_DEP_COMMAND` / `PREBAKE_APP_COMMAND`: whitespace-separated
//!   command templates replacing the cargo toolchain - default: unset

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_JOBS: usize = 4;
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Runtime configuration for the build pipeline
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Dependency artifact cache directory
    pub cache_dir: PathBuf,

    /// Scratch directory for per-stage outputs
    pub work_dir: PathBuf,

    /// Maximum parallel dependency compilations
    pub jobs: usize,

    /// Time budget per build stage
    pub stage_timeout: Duration,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Dependency-stage command template overriding the cargo toolchain
    pub dep_command: Option<Vec<String>>,

    /// Application-stage command template overriding the cargo toolchain
    pub app_command: Option<Vec<String>>,
}

impl Default for BuildConfig {
    /// Loads from `PREBAKE_*` environment variables with defaults for any
    /// missing values.
    fn default() -> Self {
        let cache_dir = env::var("PREBAKE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("prebake-cache"));

        let work_dir = env::var("PREBAKE_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cache_dir.join("work"));

        let jobs = env::var("PREBAKE_JOBS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_JOBS);

        let stage_timeout = env::var("PREBAKE_STAGE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS));

        let log_level =
            env::var("PREBAKE_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let dep_command = env::var("PREBAKE_DEP_COMMAND").ok().map(split_command);
        let app_command = env::var("PREBAKE_APP_COMMAND").ok().map(split_command);

        Self {
            cache_dir,
            work_dir,
            jobs,
            stage_timeout,
            log_level,
            dep_command,
            app_command,
        }
    }
}

fn split_command(raw: String) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::ValidationFailed(
                "jobs must be at least 1".to_string(),
            ));
        }
        if self.stage_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "stage timeout must be non-zero".to_string(),
            ));
        }
        if self.dep_command.is_some() != self.app_command.is_some() {
            return Err(ConfigError::ValidationFailed(
                "dependency and application command templates must be set together".to_string(),
            ));
        }
        if [&self.dep_command, &self.app_command]
            .into_iter()
            .flatten()
            .any(|cmd| cmd.is_empty())
        {
            return Err(ConfigError::ValidationFailed(
                "command templates must not be empty".to_string(),
            ));
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::ValidationFailed(format!(
                "invalid log level '{other}'"
            ))),
        }
    }
}
