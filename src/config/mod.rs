//! Configuration management for paperboy
//!
//! The configuration is a TOML file describing where issues are archived,
//! which newspapers are polled and on which calendar, and where fetched issues
//! are delivered. A handful of environment variables override the file.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [storage]
//! archive_dir = "data/issues"
//! catalog_path = "data/catalog.db"
//!
//! [[sources]]
//! name = "Le Temps"
//! kind = "feed"
//! schedule = { type = "daily" }
//! backoff_secs = [3600, 43200]
//! options = { url = "https://example.com/epaper.json" }
//!
//! [[sinks]]
//! kind = "archive"
//!
//! [[sinks]]
//! kind = "webhook"
//! options = { url = "https://hooks.example.com/issues" }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::scheduler::{BackoffSequence, CalendarPolicy, SourceScheduler};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "paperboy.toml";

/// Configuration errors, all fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Nothing to poll
    #[error("No source configured")]
    NoSources,

    /// Backoff sequence without any step
    #[error("Backoff sequence must contain at least one value")]
    EmptyBackoff,

    /// Retry step that would not move the next attempt forward
    #[error("Backoff step {index} must be greater than zero")]
    ZeroBackoffStep { index: usize },

    /// Weekly rule with an ISO weekday outside 1..=7
    #[error("Invalid publication day {day} for source '{source_name}' (expected 1-7)")]
    InvalidPublicationDay { source_name: String, day: u32 },

    /// Source kind missing from the registry
    #[error("Unknown source kind '{kind}'")]
    UnknownSourceKind { kind: String },

    /// Sink kind missing from the registry
    #[error("Unknown sink kind '{kind}'")]
    UnknownSinkKind { kind: String },

    /// Source requested on the command line but not configured
    #[error("Unknown source '{name}'")]
    UnknownSource { name: String },

    /// Two sources with the same name
    #[error("Source '{name}' is configured more than once")]
    DuplicateSource { name: String },

    /// Kind-specific option missing or malformed
    #[error("Invalid options for '{owner}': {reason}")]
    InvalidOptions { owner: String, reason: String },
}

impl ConfigError {
    /// Create an options error
    pub fn options(owner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            owner: owner.into(),
            reason: reason.into(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Archive and staging locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Polled newspapers, in dispatch order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Delivery destinations, in delivery order
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving archived issues
    pub archive_dir: PathBuf,

    /// SQLite issue catalog
    pub catalog_path: PathBuf,

    /// Directory for transient downloads (system temp dir when unset)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("data/issues"),
            catalog_path: PathBuf::from("data/catalog.db"),
            staging_dir: None,
        }
    }
}

/// One polled newspaper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Newspaper name, unique across the file
    pub name: String,

    /// Registry key of the source implementation
    pub kind: String,

    /// Publication calendar
    pub schedule: CalendarPolicy,

    /// Intra-day wait increments in seconds
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    /// Kind-specific options
    #[serde(default)]
    pub options: toml::Table,
}

/// One hour after midnight, then every twelve hours
fn default_backoff_secs() -> Vec<u64> {
    vec![3600, 43_200]
}

impl SourceConfig {
    /// Build the scheduler for this source, starting after `today`
    pub fn scheduler(&self, today: NaiveDate) -> Result<SourceScheduler, ConfigError> {
        self.validate()?;
        let backoff = BackoffSequence::from_secs(&self.backoff_secs)?;
        Ok(SourceScheduler::new(self.schedule, backoff, today))
    }

    /// Deserialize the kind-specific options
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_options(&self.name, &self.options)
    }

    /// Validate schedule and backoff
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let CalendarPolicy::Weekly { publication_day } = self.schedule {
            if !self.schedule.is_valid() {
                return Err(ConfigError::InvalidPublicationDay {
                    source_name: self.name.clone(),
                    day: publication_day,
                });
            }
        }
        BackoffSequence::from_secs(&self.backoff_secs)?;
        Ok(())
    }
}

/// One delivery destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Registry key of the sink implementation
    pub kind: String,

    /// Override of the kind's default criticality
    #[serde(default)]
    pub critical: Option<bool>,

    /// Kind-specific options
    #[serde(default)]
    pub options: toml::Table,
}

impl SinkConfig {
    /// Deserialize the kind-specific options
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_options(&self.kind, &self.options)
    }
}

fn decode_options<T: DeserializeOwned>(owner: &str, options: &toml::Table) -> Result<T, ConfigError> {
    toml::Value::Table(options.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::options(owner, e.message()))
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file named on the command line, in `PAPERBOY_CONFIG`, or the
    /// default file name, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var("PAPERBOY_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override file values with `PAPERBOY_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PAPERBOY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PAPERBOY_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(dir) = std::env::var("PAPERBOY_ARCHIVE_DIR") {
            self.storage.archive_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("PAPERBOY_CATALOG") {
            self.storage.catalog_path = PathBuf::from(path);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource {
                    name: source.name.clone(),
                });
            }
            source.validate()?;
        }

        Ok(())
    }

    /// Keep only the named sources, preserving configured order
    ///
    /// An empty selection keeps every source.
    pub fn select_sources(&mut self, names: &[String]) -> Result<(), ConfigError> {
        if names.is_empty() {
            return Ok(());
        }

        if let Some(missing) = names
            .iter()
            .find(|name| !self.sources.iter().any(|s| &s.name == *name))
        {
            return Err(ConfigError::UnknownSource {
                name: missing.clone(),
            });
        }

        self.sources.retain(|s| names.contains(&s.name));
        Ok(())
    }
}
