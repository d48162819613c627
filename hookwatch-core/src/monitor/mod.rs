//! Filesystem monitoring and the event-to-webhook pipeline
//!
//! This module provides:
//! - Recursive directory watch registration over a pluggable source
//! - Raw operation classification into notification kinds
//! - Glob filtering on file names
//! - Per-path debouncing
//! - The orchestrating watcher and its lifecycle

pub mod classifier;
pub mod debouncer;
pub mod pattern;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod watcher;

pub use classifier::{EventClassifier, classify, is_enabled};
pub use debouncer::{DEBOUNCE_INTERVAL, Debouncer};
pub use pattern::{PatternMatcher, matches};
pub use pipeline::{Decision, DropReason, EventPipeline};
pub use source::{ChannelSource, NotifySource, SourceStreams, WatchSource, raw_events};
pub use state::WatcherState;
pub use watcher::DirectoryWatcher;

use bitflags::bitflags;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

bitflags! {
    /// Operation bits reported by the notification source for one path
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RawOp: u8 {
        const CREATE = 0b0000_0001;
        const WRITE = 0b0000_0010;
        const REMOVE = 0b0000_0100;
        const RENAME = 0b0000_1000;
        const CHMOD = 0b0001_0000;
    }
}

/// A raw change delivered by the notification source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub op: RawOp,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: RawOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Semantic kind of a change, as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl NotificationKind {
    /// Configuration name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved => "moved",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from watch registration and the watcher lifecycle
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to create notification source: {0}")]
    Source(#[source] notify::Error),

    #[error("Failed to watch directory {path}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to walk directory {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to set up webhook dispatch: {0}")]
    Dispatch(#[from] crate::dispatch::DispatchError),

    #[error("Invalid watcher state transition from {from} to {to}")]
    InvalidTransition {
        from: WatcherState,
        to: WatcherState,
    },
}

pub type Result<T> = std::result::Result<T, WatchError>;
