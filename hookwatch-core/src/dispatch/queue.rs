//! Bounded FIFO of pending deliveries with an explicit overflow policy

use crate::config::OverflowPolicy;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// A notification waiting for a worker
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub path: PathBuf,
    pub event_id: Uuid,
    pub queued_at: Instant,
}

impl DispatchJob {
    pub fn new(path: PathBuf, event_id: Uuid) -> Self {
        Self {
            path,
            event_id,
            queued_at: Instant::now(),
        }
    }
}

/// Result of offering a job to a full or non-full queue
#[derive(Debug)]
pub enum Admission {
    /// Job queued without displacing anything
    Queued,
    /// Job queued; the returned oldest job was evicted
    Evicted(DispatchJob),
    /// Queue full; the offered job was not queued
    Rejected(DispatchJob),
}

/// Counters over the queue's lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub total_enqueued: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub total_dropped: u64,
}

/// Queue shared between the dispatcher and pool workers
#[derive(Debug)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<DispatchJob>>,
    capacity: usize,
    overflow: OverflowPolicy,
    stats: Mutex<QueueStats>,
}

impl JobQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            overflow,
            stats: Mutex::new(QueueStats::default()),
        }
    }

    /// Offer a job, applying the overflow policy when full
    pub fn push(&self, job: DispatchJob) -> Admission {
        let mut jobs = lock(&self.jobs);

        let admission = if jobs.len() < self.capacity {
            Admission::Queued
        } else {
            match self.overflow {
                OverflowPolicy::DropNewest => {
                    warn!(
                        "Dispatch queue full, dropping event {}: {:?}",
                        job.event_id, job.path
                    );
                    lock(&self.stats).total_dropped += 1;
                    return Admission::Rejected(job);
                }
                OverflowPolicy::DropOldest => match jobs.pop_front() {
                    Some(oldest) => {
                        warn!(
                            "Dispatch queue full, dropping oldest event {}: {:?}",
                            oldest.event_id, oldest.path
                        );
                        lock(&self.stats).total_dropped += 1;
                        Admission::Evicted(oldest)
                    }
                    None => Admission::Queued,
                },
            }
        };

        debug!("Queued event {} for {:?}", job.event_id, job.path);
        jobs.push_back(job);
        lock(&self.stats).total_enqueued += 1;

        admission
    }

    /// Take the oldest pending job
    pub fn pop(&self) -> Option<DispatchJob> {
        lock(&self.jobs).pop_front()
    }

    /// Record the result of a delivery taken from this queue
    pub fn record_outcome(&self, delivered: bool) {
        let mut stats = lock(&self.stats);
        if delivered {
            stats.total_delivered += 1;
        } else {
            stats.total_failed += 1;
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every pending job; returns how many were discarded
    pub fn clear(&self) -> usize {
        let mut jobs = lock(&self.jobs);
        let count = jobs.len();
        jobs.clear();
        if count > 0 {
            lock(&self.stats).total_dropped += count as u64;
            debug!("Cleared {} pending deliveries", count);
        }
        count
    }

    pub fn stats(&self) -> QueueStats {
        *lock(&self.stats)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> DispatchJob {
        DispatchJob::new(PathBuf::from(format!("/in/{name}")), Uuid::new_v4())
    }

    fn drain_names(queue: &JobQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop())
            .map(|j| j.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let queue = JobQueue::new(10, OverflowPolicy::DropNewest);
        for name in ["a", "b", "c"] {
            assert!(matches!(queue.push(job(name)), Admission::Queued));
        }

        assert_eq!(drain_names(&queue), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_newest_rejects_incoming() {
        let queue = JobQueue::new(2, OverflowPolicy::DropNewest);
        queue.push(job("a"));
        queue.push(job("b"));

        match queue.push(job("c")) {
            Admission::Rejected(rejected) => assert_eq!(rejected.path, PathBuf::from("/in/c")),
            other => panic!("expected rejection, got {other:?}"),
        }

        assert_eq!(drain_names(&queue), vec!["a", "b"]);
        let stats = queue.stats();
        assert_eq!(stats.total_enqueued, 2);
        assert_eq!(stats.total_dropped, 1);
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let queue = JobQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(job("a"));
        queue.push(job("b"));

        match queue.push(job("c")) {
            Admission::Evicted(evicted) => assert_eq!(evicted.path, PathBuf::from("/in/a")),
            other => panic!("expected eviction, got {other:?}"),
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(drain_names(&queue), vec!["b", "c"]);
        let stats = queue.stats();
        assert_eq!(stats.total_enqueued, 3);
        assert_eq!(stats.total_dropped, 1);
    }

    #[test]
    fn test_outcomes_and_clear() {
        let queue = JobQueue::new(4, OverflowPolicy::DropNewest);
        queue.push(job("a"));
        queue.push(job("b"));

        queue.record_outcome(true);
        queue.record_outcome(false);
        assert_eq!(queue.clear(), 2);

        let stats = queue.stats();
        assert_eq!(stats.total_delivered, 1);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_dropped, 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = JobQueue::new(0, OverflowPolicy::DropNewest);
        assert_eq!(queue.capacity(), 1);
        assert!(matches!(queue.push(job("a")), Admission::Queued));
    }
}
