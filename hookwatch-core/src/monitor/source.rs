//! Notification sources feeding the watcher
//!
//! A source registers individual directories and delivers two streams: raw
//! events and source-level errors. [`NotifySource`] is backed by the
//! platform watcher from the `notify` crate; [`ChannelSource`] is an
//! in-memory source driven by the caller.

use crate::monitor::{RawEvent, RawOp};
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// Receiving ends of a source
#[derive(Debug)]
pub struct SourceStreams {
    pub events: mpsc::UnboundedReceiver<RawEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// A filesystem notification source
pub trait WatchSource: Send {
    /// Register a single directory (non-recursively)
    fn watch(&mut self, dir: &Path) -> Result<(), notify::Error>;

    /// Release every registration. Safe to call more than once.
    fn close(&mut self);
}

/// Source backed by the platform's recommended `notify` watcher
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
    watched: Vec<PathBuf>,
}

impl NotifySource {
    /// Create the platform watcher and its streams
    pub fn new() -> Result<(Self, SourceStreams), notify::Error> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in raw_events(event) {
                    if event_tx.send(raw).is_err() {
                        trace!("Event receiver dropped");
                    }
                }
            }
            Err(e) => {
                if let Err(e) = error_tx.send(e) {
                    error!("Watch error with no receiver: {}", e.0);
                }
            }
        })?;

        let source = Self {
            watcher: Some(watcher),
            watched: Vec::new(),
        };
        Ok((source, SourceStreams { events, errors }))
    }
}

impl WatchSource for NotifySource {
    fn watch(&mut self, dir: &Path) -> Result<(), notify::Error> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or_else(|| notify::Error::generic("notification source is closed"))?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched.push(dir.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            for dir in self.watched.drain(..) {
                if let Err(e) = watcher.unwatch(&dir) {
                    debug!("Failed to unwatch {:?}: {}", dir, e);
                }
            }
        }
    }
}

impl Drop for NotifySource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Translate a `notify` event into per-path raw operations
///
/// Renames follow the convention of reporting the old path as RENAME and
/// the new path as CREATE. Folder removals produce nothing.
pub fn raw_events(event: Event) -> Vec<RawEvent> {
    let Event { kind, paths, .. } = event;

    let op = match kind {
        EventKind::Remove(RemoveKind::Folder) => {
            trace!("Ignoring folder removal: {:?}", paths);
            return Vec::new();
        }
        EventKind::Create(_) => RawOp::CREATE,
        EventKind::Remove(_) => RawOp::REMOVE,
        EventKind::Modify(ModifyKind::Metadata(_)) => RawOp::CHMOD,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => RawOp::CREATE,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            return paths
                .next()
                .map(|from| RawEvent::new(from, RawOp::RENAME))
                .into_iter()
                .chain(paths.next().map(|to| RawEvent::new(to, RawOp::CREATE)))
                .collect();
        }
        EventKind::Modify(ModifyKind::Name(_)) => RawOp::RENAME,
        EventKind::Modify(_) => RawOp::WRITE,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => RawOp::empty(),
    };

    paths.into_iter().map(|path| RawEvent::new(path, op)).collect()
}

#[derive(Debug, Default)]
struct ChannelState {
    watched: Vec<PathBuf>,
    failing: HashSet<PathBuf>,
    closed: bool,
    event_tx: Option<mpsc::UnboundedSender<RawEvent>>,
    error_tx: Option<mpsc::UnboundedSender<notify::Error>>,
}

/// In-memory source: records registrations and forwards injected events
///
/// Clones share state, so a handle kept by the caller can inject events
/// after the source has been handed to a watcher.
#[derive(Debug, Clone)]
pub struct ChannelSource {
    state: Arc<Mutex<ChannelState>>,
}

impl ChannelSource {
    pub fn new() -> (Self, SourceStreams) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let state = ChannelState {
            event_tx: Some(event_tx),
            error_tx: Some(error_tx),
            ..ChannelState::default()
        };

        let source = Self {
            state: Arc::new(Mutex::new(state)),
        };
        (source, SourceStreams { events, errors })
    }

    /// Make registration of `dir` fail
    pub fn fail_on(&self, dir: impl Into<PathBuf>) {
        self.lock().failing.insert(dir.into());
    }

    /// Directories registered so far, in registration order
    pub fn watched(&self) -> Vec<PathBuf> {
        self.lock().watched.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Deliver a raw event; returns false once the source is closed
    pub fn emit(&self, event: RawEvent) -> bool {
        self.lock()
            .event_tx
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Deliver a source error; returns false once the source is closed
    pub fn emit_error(&self, error: notify::Error) -> bool {
        self.lock()
            .error_tx
            .as_ref()
            .is_some_and(|tx| tx.send(error).is_ok())
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WatchSource for ChannelSource {
    fn watch(&mut self, dir: &Path) -> Result<(), notify::Error> {
        let mut state = self.lock();
        if state.closed {
            return Err(notify::Error::generic("notification source is closed"));
        }
        if state.failing.contains(dir) {
            let err = notify::Error::generic("registration refused");
            return Err(err.add_path(dir.to_path_buf()));
        }
        state.watched.push(dir.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.closed = true;
        state.event_tx = None;
        state.error_tx = None;
    }
}
