//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/scrawl/config.toml)
//! 3. Environment variables (SCRAWL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::daemon::ConflictStrategy;

/// Environment variable prefix
const ENV_PREFIX: &str = "SCRAWL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The git-backed record repository
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Batched-commit settings
    #[serde(default)]
    pub batch: BatchSettings,

    /// Auto-sync daemon settings
    #[serde(default)]
    pub daemon: DaemonSettings,
}

/// Settings for the batch commit coordinator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchSettings {
    /// Defer commits until `threshold` writes have accumulated
    pub enabled: bool,
    /// Writes per batch (minimum 1)
    pub threshold: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 5,
        }
    }
}

/// Settings for the auto-sync daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonSettings {
    /// Seconds between cycles
    pub interval_secs: u64,
    /// How to resolve local edits racing the daemon's commits
    pub conflict_strategy: ConflictStrategy,
    /// Commit-message generation service
    pub llm: LlmSettings,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            conflict_strategy: ConflictStrategy::default(),
            llm: LlmSettings::default(),
        }
    }
}

/// Settings for the optional commit-message generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    /// Base URL of an Ollama-compatible API
    pub endpoint: String,
    pub model: String,
    /// Hard bound on a generation call; on expiry the default message is used
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "phi3.5".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            batch: BatchSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SCRAWL_REPO, SCRAWL_BATCH_ENABLED, ...)
    /// 2. Config file (~/.config/scrawl/config.toml or SCRAWL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.batch.threshold = config.batch.threshold.max(1);
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.batch.threshold = config.batch.threshold.max(1);
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_REPO", ENV_PREFIX)) {
            self.repo_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_BATCH_ENABLED", ENV_PREFIX)) {
            self.batch.enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_BATCH_THRESHOLD", ENV_PREFIX)) {
            if let Ok(threshold) = val.parse() {
                self.batch.threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DAEMON_INTERVAL", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.daemon.interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CONFLICT_STRATEGY", ENV_PREFIX)) {
            match val.parse() {
                Ok(strategy) => self.daemon.conflict_strategy = strategy,
                Err(e) => tracing::warn!("{e}, keeping configured strategy"),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with the SCRAWL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scrawl")
            .join("config.toml")
    }

    /// Directory holding record content and metadata files
    pub fn records_dir(&self) -> PathBuf {
        self.repo_path.join("records")
    }

    /// Path to the tag index document
    pub fn index_path(&self) -> PathBuf {
        self.repo_path.join(".tags_index.json")
    }

    /// Path to the batch counter file
    pub fn counter_path(&self) -> PathBuf {
        self.repo_path.join(".batch_counter")
    }

    /// Path to the append-only conflict log
    pub fn conflict_log_path(&self) -> PathBuf {
        self.repo_path.join(".conflict_log")
    }

    /// Path to the daemon's sync cursor file
    pub fn cursor_path(&self) -> PathBuf {
        self.repo_path.join(".sync_cursor")
    }
}

/// Get the default repository path
fn default_repo_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrawl")
}
