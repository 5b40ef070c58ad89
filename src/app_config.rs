use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Application configuration module
/// This module handles the service configuration including loading,
/// validating and saving configuration settings.
/// Represents the service configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// External tool invocation settings
    #[serde(default)]
    pub tool: ToolConfig,

    /// Request handling defaults and shared-state sizing
    #[serde(default)]
    pub service: ServiceConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How the external command-line tool is invoked
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolConfig {
    // @field: Program name or absolute path
    #[serde(default = "default_program")]
    pub program: String,

    // @field: Arguments for the installation probe
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,

    // @field: Arguments for the login status probe
    #[serde(default = "default_status_args")]
    pub status_args: Vec<String>,

    // @field: Arguments for a translation run; `{model}` and `{workdir}` are expanded
    #[serde(default = "default_exec_args")]
    pub exec_args: Vec<String>,

    // @field: Timeout for one translation run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Grace period between SIGTERM and SIGKILL
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,

    // @field: Timeout for each health probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            version_args: default_version_args(),
            status_args: default_status_args(),
            exec_args: default_exec_args(),
            timeout_secs: default_timeout_secs(),
            kill_grace_secs: default_kill_grace_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Defaults applied to incoming requests, and sizes of the shared state
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Source language used when a request leaves it empty
    #[serde(default = "default_source_language")]
    pub default_source_language: String,

    /// Target language used when a request leaves it empty
    #[serde(default = "default_target_language")]
    pub default_target_language: String,

    /// Items per tool invocation when a request does not say
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Per-item character limit when a request does not say
    #[serde(default = "default_max_chars_per_item")]
    pub default_max_chars_per_item: usize,

    /// Maximum number of cached translations
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// How long a health snapshot stays fresh
    #[serde(default = "default_health_ttl_secs")]
    pub health_ttl_secs: u64,

    /// Tool invocations allowed at the same time across all requests
    #[serde(default = "default_max_concurrent_invocations")]
    pub max_concurrent_invocations: usize,
}

impl ServiceConfig {
    pub fn health_ttl(&self) -> Duration {
        Duration::from_secs(self.health_ttl_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_source_language: default_source_language(),
            default_target_language: default_target_language(),
            default_batch_size: default_batch_size(),
            default_max_chars_per_item: default_max_chars_per_item(),
            cache_capacity: default_cache_capacity(),
            health_ttl_secs: default_health_ttl_secs(),
            max_concurrent_invocations: default_max_concurrent_invocations(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_program() -> String {
    "codex".to_string()
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_status_args() -> Vec<String> {
    vec!["login".to_string(), "status".to_string()]
}

fn default_exec_args() -> Vec<String> {
    [
        "exec",
        "--skip-git-repo-check",
        "--sandbox",
        "read-only",
        "-m",
        "{model}",
        "-C",
        "{workdir}",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_kill_grace_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "zh-CN".to_string()
}

fn default_batch_size() -> usize {
    8
}

fn default_max_chars_per_item() -> usize {
    1200
}

fn default_cache_capacity() -> usize {
    3000
}

fn default_health_ttl_secs() -> u64 {
    10
}

fn default_max_concurrent_invocations() -> usize {
    1
}

impl Config {
    /// Load configuration from a JSON file, creating it with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.tool.program.trim().is_empty() {
            return Err(anyhow!("tool.program must not be empty"));
        }
        if self.tool.timeout_secs == 0 {
            return Err(anyhow!("tool.timeout_secs must be greater than zero"));
        }
        if self.tool.probe_timeout_secs == 0 {
            return Err(anyhow!("tool.probe_timeout_secs must be greater than zero"));
        }
        if self.service.cache_capacity == 0 {
            return Err(anyhow!("service.cache_capacity must be greater than zero"));
        }
        if self.service.max_concurrent_invocations == 0 {
            return Err(anyhow!("service.max_concurrent_invocations must be greater than zero"));
        }
        if self.service.default_model.trim().is_empty() {
            return Err(anyhow!("service.default_model must not be empty"));
        }

        // Validate languages
        let _target_name = crate::language_utils::get_language_name(&self.service.default_target_language)?;
        if !crate::language_utils::is_auto(&self.service.default_source_language) {
            let _source_name = crate::language_utils::get_language_name(&self.service.default_source_language)?;
        }

        Ok(())
    }
}
