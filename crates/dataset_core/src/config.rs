//! Storage configuration.
//!
//! # Responsibility
//! - Describe how the dataset database is opened (path, pool, pragmas).
//! - Reject unusable configuration before any connection is opened.
//!
//! # Invariants
//! - `pool_size` is at least one.
//! - `busy_timeout_ms` is interpreted as milliseconds.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POOL_SIZE: usize = 4;

/// SQLite journal mode applied to every pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Configuration for a file-backed dataset database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Number of connections kept open; each serves one operation at a time.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl StoreConfig {
    /// Creates a configuration for `path` with default tuning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            pool_size: DEFAULT_POOL_SIZE,
            journal_mode: JournalMode::default(),
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether `path` names a private in-memory database (`:memory:` or a
    /// `mode=memory` URI). Such databases exist per connection.
    pub fn is_in_memory(&self) -> bool {
        let path = self.path.to_string_lossy();
        path == ":memory:" || path.starts_with("file::memory:") || path.contains("mode=memory")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("path cannot be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration parse/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid store config: {message}"),
            Self::Invalid(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for ConfigError {}
