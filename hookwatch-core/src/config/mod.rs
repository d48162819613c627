//! Configuration for the watcher
//!
//! The on-disk format is a JSON object with a single `FileWatcher` section.
//! Besides the required keys, a few optional keys tune how webhook
//! dispatches are scheduled; leaving them out keeps the default behavior of
//! firing every accepted event immediately.

pub mod env;

pub use env::{expand_env, expand_with};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Pattern used when `file_extension_pattern` is absent or empty
pub const DEFAULT_PATTERN: &str = "*.*";

/// Default capacity of the bounded dispatch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level shape of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "FileWatcher")]
    pub file_watcher: WatchConfig,
}

/// Settings for the watcher and its webhook target
#[derive(Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Root directories, watched recursively. May contain `$VAR` references.
    pub directories: Vec<String>,

    /// Enabled event kinds: any of `created`, `modified`, `deleted`, `moved`
    pub event_types: Vec<String>,

    /// Glob pattern matched against file names
    #[serde(default)]
    pub file_extension_pattern: String,

    /// Webhook URL
    pub post_url: String,

    /// Value of the `Authorization` header
    pub authentication_header: String,

    /// Upper bound on concurrently delivered webhooks. Absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_dispatches: Option<usize>,

    /// Queue capacity when dispatches are bounded
    #[serde(default = "default_queue_capacity")]
    pub dispatch_queue_capacity: usize,

    /// What to do when the bounded queue is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Behavior of the bounded dispatch queue when it is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming notification
    #[default]
    DropNewest,
    /// Evict the oldest queued notification to make room
    DropOldest,
}

/// How accepted events are handed to the webhook client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One task per notification, no cap
    Unbounded,
    /// Fixed worker pool fed by a bounded queue
    Bounded {
        workers: usize,
        capacity: usize,
        overflow: OverflowPolicy,
    },
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded {
                workers,
                capacity,
                overflow,
            } => write!(
                f,
                "bounded ({} workers, queue {}, {:?})",
                workers, capacity, overflow
            ),
        }
    }
}

impl WatchConfig {
    /// Create a config with the required fields and default tuning
    pub fn new(
        directories: Vec<String>,
        event_types: Vec<String>,
        post_url: impl Into<String>,
        authentication_header: impl Into<String>,
    ) -> Self {
        Self {
            directories,
            event_types,
            file_extension_pattern: String::new(),
            post_url: post_url.into(),
            authentication_header: authentication_header.into(),
            max_concurrent_dispatches: None,
            dispatch_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }

    /// Set the file name pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_extension_pattern = pattern.into();
        self
    }

    /// Load configuration from a JSON file
    ///
    /// Environment references in the authentication header are expanded
    /// here; directory entries are expanded when the watcher starts.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a JSON document
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(content)?;
        let mut config = file.file_watcher;
        config.authentication_header = expand_env(&config.authentication_header);

        for kind in &config.event_types {
            if !matches!(kind.as_str(), "created" | "modified" | "deleted" | "moved") {
                debug!("Unknown event type in config will never match: {}", kind);
            }
        }

        Ok(config)
    }

    /// Pattern with the empty-string default applied
    pub fn effective_pattern(&self) -> &str {
        if self.file_extension_pattern.is_empty() {
            DEFAULT_PATTERN
        } else {
            &self.file_extension_pattern
        }
    }

    /// Resolved dispatch scheduling
    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.max_concurrent_dispatches {
            Some(workers) if workers > 0 => DispatchMode::Bounded {
                workers,
                capacity: self.dispatch_queue_capacity.max(1),
                overflow: self.overflow_policy,
            },
            _ => DispatchMode::Unbounded,
        }
    }
}

// The credential never shows up in logs or panics.
impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("directories", &self.directories)
            .field("event_types", &self.event_types)
            .field("file_extension_pattern", &self.file_extension_pattern)
            .field("post_url", &self.post_url)
            .field("authentication_header", &"REDACTED")
            .field("max_concurrent_dispatches", &self.max_concurrent_dispatches)
            .field("dispatch_queue_capacity", &self.dispatch_queue_capacity)
            .field("overflow_policy", &self.overflow_policy)
            .finish()
    }
}
