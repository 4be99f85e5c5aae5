//! Configuration
//!
//! Provides configuration management with:
//! - Runtime defaults
//! - Config file loading (TOML, `basic` feature)
//! - Environment variable overrides
//! - Validation
//!
//! The loaded [`Config`] is an ordinary value. It is passed to the parts of
//! the program that need it; the engine never reads configuration on its own.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Batch processing configuration
    pub processing: ProcessingConfig,

    /// Memory configuration
    pub memory: MemoryConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Person records per batch
    pub batch_size: usize,
    /// Run a full validation pass before aggregating
    pub validate_before_query: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_memory_mb: usize,
    pub buffer_size_kb: usize,
    pub warning_threshold_pct: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::reader::DEFAULT_BATCH_SIZE,
            validate_before_query: false,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            buffer_size_kb: 64,
            warning_threshold_pct: 90,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_directory: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("timesheet-hours")
                .join("logs"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            processing: ProcessingConfig::default(),
            memory: MemoryConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, config file and environment
    pub fn load() -> Result<Self> {
        #[cfg_attr(not(feature = "basic"), allow(unused_mut))]
        let mut config = Config::default();

        #[cfg(feature = "basic")]
        for path in Self::config_paths() {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(&path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Candidate config files, first match wins
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("timesheet-hours.toml"),
            PathBuf::from(".timesheet-hours.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("timesheet-hours").join("config.toml"));
        }
        paths
    }

    /// Load configuration from TOML file
    #[cfg(feature = "basic")]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Processing overrides
        if let Ok(val) = env::var("TIMESHEET_BATCH_SIZE") {
            self.processing.batch_size = val.parse().context("Invalid TIMESHEET_BATCH_SIZE")?;
        }
        if let Ok(val) = env::var("TIMESHEET_VALIDATE") {
            self.processing.validate_before_query =
                val.parse().context("Invalid TIMESHEET_VALIDATE")?;
        }

        // Memory overrides
        if let Ok(val) = env::var("TIMESHEET_MAX_MEMORY_MB") {
            self.memory.max_memory_mb = val.parse().context("Invalid TIMESHEET_MAX_MEMORY_MB")?;
        }
        if let Ok(val) = env::var("TIMESHEET_BUFFER_SIZE_KB") {
            self.memory.buffer_size_kb =
                val.parse().context("Invalid TIMESHEET_BUFFER_SIZE_KB")?;
        }

        // Path overrides
        if let Ok(val) = env::var("TIMESHEET_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.processing.batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size must be greater than 0"));
        }

        if self.memory.max_memory_mb < 64 {
            warn!(
                max_memory_mb = self.memory.max_memory_mb,
                "Memory limit is very low, large batches will report pressure"
            );
        }

        if self.memory.buffer_size_kb < 1 || self.memory.buffer_size_kb > 1024 {
            return Err(anyhow::anyhow!(
                "Buffer size must be between 1KB and 1024KB, got {}KB",
                self.memory.buffer_size_kb
            ));
        }

        if self.memory.warning_threshold_pct == 0 || self.memory.warning_threshold_pct > 100 {
            return Err(anyhow::anyhow!(
                "Warning threshold must be between 1% and 100%, got {}%",
                self.memory.warning_threshold_pct
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "Log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            ));
        }

        if !matches!(self.logging.output.as_str(), "console" | "file" | "both") {
            return Err(anyhow::anyhow!(
                "Log output must be 'console', 'file' or 'both', got '{}'",
                self.logging.output
            ));
        }

        Ok(())
    }

    /// Create the log directory when file logging is enabled
    pub fn ensure_log_directory(&self) -> Result<()> {
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }
        Ok(())
    }

    /// Memory limit in bytes. Pressure is reported at
    /// `warning_threshold_pct` of this value.
    pub fn memory_limit_bytes(&self) -> usize {
        self.memory.max_memory_mb.saturating_mul(1_000_000)
    }

    /// Save current configuration to file
    #[cfg(feature = "basic")]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}
