//! Per-path debouncing of accepted events
//!
//! A path is admitted when it has never been seen, or when at least the
//! debounce interval has passed since its last admitted event. Suppressed
//! events do not move the window, so a burst collapses to one admission per
//! interval anchored on the first event of each window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::{debug, trace};

/// Minimum time between two accepted events for the same path
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// How often the housekeeping task sweeps stale entries
pub const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Entries older than this many intervals are swept
pub const RETENTION_FACTOR: u32 = 10;

/// Tracks the last accepted event time per path
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    last_accepted: Mutex<HashMap<PathBuf, Instant>>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_INTERVAL)
    }
}

impl Debouncer {
    /// Create a debouncer with the given window
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether an event for `path` happening now should be processed
    pub fn should_process(&self, path: &Path) -> bool {
        self.should_process_at(path, Instant::now())
    }

    /// Same as [`should_process`](Self::should_process) with an explicit clock reading
    pub fn should_process_at(&self, path: &Path, now: Instant) -> bool {
        let mut last_accepted = self.lock();

        match last_accepted.get(path) {
            Some(last) if now.saturating_duration_since(*last) < self.interval => {
                trace!("Debounced event for {:?}", path);
                false
            }
            _ => {
                last_accepted.insert(path.to_path_buf(), now);
                true
            }
        }
    }

    /// Remove entries whose last accepted event is older than `max_age`
    pub fn sweep(&self, max_age: Duration) -> usize {
        self.sweep_at(max_age, Instant::now())
    }

    pub fn sweep_at(&self, max_age: Duration, now: Instant) -> usize {
        let mut last_accepted = self.lock();
        let before = last_accepted.len();
        last_accepted.retain(|_, last| now.saturating_duration_since(*last) < max_age);
        before - last_accepted.len()
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Spawn the periodic sweep; the task runs until aborted
    pub fn spawn_housekeeping(self: &Arc<Self>) -> JoinHandle<()> {
        let debouncer = Arc::clone(self);
        let max_age = debouncer.interval.saturating_mul(RETENTION_FACTOR);

        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_PERIOD);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = debouncer.sweep(max_age);
                if removed > 0 {
                    debug!(
                        "Swept {} stale debounce entries ({} remain)",
                        removed,
                        debouncer.len()
                    );
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
