//! Per-event gate sequence between the source and the dispatcher
//!
//! Order: stat the path, reject directories, match the file pattern,
//! classify the operation, check the kind is enabled, debounce, dispatch.
//! Every rejection is reported as a [`DropReason`] instead of an error so a
//! single bad event can never disturb the loop.

use crate::config::WatchConfig;
use crate::dispatch::Dispatcher;
use crate::monitor::{
    Debouncer, EventClassifier, NotificationKind, PatternMatcher, RawEvent, RawOp,
};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Why an event did not produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Path disappeared before it could be inspected
    Vanished,
    /// Inspecting the path failed for another reason
    StatFailed,
    Directory,
    PatternMismatch,
    /// No known operation bit set
    Unclassified,
    KindDisabled,
    Debounced,
}

/// What the pipeline did with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Dispatched {
        kind: NotificationKind,
        event_id: Uuid,
    },
    Dropped(DropReason),
}

impl Decision {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Decision::Dispatched { .. })
    }
}

/// Filters, debounces and dispatches raw events
#[derive(Clone)]
pub struct EventPipeline {
    matcher: PatternMatcher,
    classifier: EventClassifier,
    debouncer: Arc<Debouncer>,
    dispatcher: Dispatcher,
    // Registered directories; a removed one can no longer be stat'ed.
    directories: Arc<Mutex<HashSet<PathBuf>>>,
}

impl EventPipeline {
    pub fn new(config: &WatchConfig, debouncer: Arc<Debouncer>, dispatcher: Dispatcher) -> Self {
        Self {
            matcher: PatternMatcher::new(config.effective_pattern()),
            classifier: EventClassifier::new(config.event_types.clone()),
            debouncer,
            dispatcher,
            directories: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn debouncer(&self) -> &Arc<Debouncer> {
        &self.debouncer
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Remember `dir` as a directory so its removal is never reported
    pub fn track_directory(&self, dir: impl Into<PathBuf>) {
        self.directories().insert(dir.into());
    }

    pub fn is_tracked_directory(&self, path: &Path) -> bool {
        self.directories().contains(path)
    }

    /// Run one event through the gates; dispatch is handed off, not awaited
    pub fn handle(&self, event: RawEvent) -> Decision {
        let RawEvent { path, op } = event;

        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => {
                trace!("Ignoring directory event: {:?}", path);
                return Decision::Dropped(DropReason::Directory);
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !op.contains(RawOp::REMOVE) {
                    trace!("Path vanished before processing: {:?}", path);
                    return Decision::Dropped(DropReason::Vanished);
                }
                if self.is_tracked_directory(&path) {
                    debug!("Watched directory removed: {:?}", path);
                    return Decision::Dropped(DropReason::Directory);
                }
            }
            Err(e) => {
                warn!("Error getting file info for {:?}: {}", path, e);
                return Decision::Dropped(DropReason::StatFailed);
            }
        }

        if !self.matcher.is_match(&path) {
            trace!(
                "Path does not match pattern {:?}: {:?}",
                self.matcher.pattern(),
                path
            );
            return Decision::Dropped(DropReason::PatternMismatch);
        }

        let Some(kind) = self.classifier.classify(op) else {
            trace!("Unclassified operation {:?} for {:?}", op, path);
            return Decision::Dropped(DropReason::Unclassified);
        };

        if !self.classifier.is_enabled(kind) {
            trace!("Event kind {} not enabled: {:?}", kind, path);
            return Decision::Dropped(DropReason::KindDisabled);
        }

        if !self.debouncer.should_process(&path) {
            debug!("Debounced {} event for {:?}", kind, path);
            return Decision::Dropped(DropReason::Debounced);
        }

        let event_id = Uuid::new_v4();
        info!(
            "Detected event {} ({}) for file: {}",
            event_id,
            kind,
            path.display()
        );
        self.dispatcher.dispatch(path, event_id);

        Decision::Dispatched { kind, event_id }
    }

    fn directories(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchMode;
    use crate::dispatch::WebhookClient;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    const UNREACHABLE: &str = "http://127.0.0.1:9/";

    fn pipeline(kinds: &[&str], pattern: &str, url: &str) -> EventPipeline {
        let kinds = kinds.iter().map(|s| s.to_string()).collect();
        let config =
            WatchConfig::new(vec![], kinds, url, "Bearer test").with_pattern(pattern);
        let client = WebhookClient::new(url, "Bearer test").unwrap();
        let dispatcher = Dispatcher::new(client, DispatchMode::Unbounded);
        EventPipeline::new(&config, Arc::new(Debouncer::default()), dispatcher)
    }

    #[tokio::test]
    async fn test_directories_are_dropped() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested.csv");
        fs::create_dir(&sub).unwrap();

        let pipeline = pipeline(&["created"], "*.csv", UNREACHABLE);
        let decision = pipeline.handle(RawEvent::new(&sub, RawOp::CREATE));

        assert_eq!(decision, Decision::Dropped(DropReason::Directory));
        assert!(pipeline.debouncer().is_empty());
    }

    #[tokio::test]
    async fn test_removed_directory_is_dropped() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("subdir");
        fs::create_dir(&sub).unwrap();

        let pipeline = pipeline(&["deleted"], "", UNREACHABLE);
        pipeline.track_directory(&sub);
        fs::remove_dir(&sub).unwrap();

        assert_eq!(
            pipeline.handle(RawEvent::new(&sub, RawOp::REMOVE)),
            Decision::Dropped(DropReason::Directory)
        );
        assert!(pipeline.debouncer().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_path_is_dropped_unless_removed() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone.csv");
        let pipeline = pipeline(&["created", "deleted"], "*.csv", UNREACHABLE);

        assert_eq!(
            pipeline.handle(RawEvent::new(&gone, RawOp::CREATE)),
            Decision::Dropped(DropReason::Vanished)
        );
        assert_eq!(
            pipeline.handle(RawEvent::new(&gone, RawOp::RENAME)),
            Decision::Dropped(DropReason::Vanished)
        );

        let decision = pipeline.handle(RawEvent::new(&gone, RawOp::REMOVE));
        assert!(matches!(
            decision,
            Decision::Dispatched {
                kind: NotificationKind::Deleted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_pattern_mismatch_is_dropped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "x").unwrap();

        let pipeline = pipeline(&["created"], "*.csv", UNREACHABLE);
        assert_eq!(
            pipeline.handle(RawEvent::new(&file, RawOp::CREATE)),
            Decision::Dropped(DropReason::PatternMismatch)
        );
    }

    #[tokio::test]
    async fn test_unclassified_is_dropped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();

        let pipeline = pipeline(&["created"], "", UNREACHABLE);
        assert_eq!(
            pipeline.handle(RawEvent::new(&file, RawOp::CHMOD)),
            Decision::Dropped(DropReason::Unclassified)
        );
    }

    #[tokio::test]
    async fn test_disabled_kind_never_reaches_debouncer() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();

        let pipeline = pipeline(&["created"], "*.csv", UNREACHABLE);
        assert_eq!(
            pipeline.handle(RawEvent::new(&file, RawOp::WRITE)),
            Decision::Dropped(DropReason::KindDisabled)
        );
        assert!(pipeline.debouncer().is_empty());
    }

    #[tokio::test]
    async fn test_priority_applies_before_enablement() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();

        // CREATE|WRITE classifies as created, which is not enabled here.
        let pipeline = pipeline(&["modified"], "*.csv", UNREACHABLE);
        assert_eq!(
            pipeline.handle(RawEvent::new(&file, RawOp::CREATE | RawOp::WRITE)),
            Decision::Dropped(DropReason::KindDisabled)
        );
    }

    #[tokio::test]
    async fn test_burst_is_debounced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();

        let url = format!("{}/hook", server.url());
        let pipeline = pipeline(&["created", "modified"], "*.csv", &url);

        let first = pipeline.handle(RawEvent::new(&file, RawOp::CREATE));
        let second = pipeline.handle(RawEvent::new(&file, RawOp::WRITE));
        let third = pipeline.handle(RawEvent::new(&file, RawOp::WRITE));

        assert!(first.is_dispatched());
        assert_eq!(second, Decision::Dropped(DropReason::Debounced));
        assert_eq!(third, Decision::Dropped(DropReason::Debounced));

        timeout(Duration::from_secs(5), async {
            while !mock.matched_async().await {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        mock.assert_async().await;
    }
}
