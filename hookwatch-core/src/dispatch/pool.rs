//! Fixed-size worker pool draining the dispatch queue

use crate::config::OverflowPolicy;
use crate::dispatch::{
    Admission, DispatchJob, JobQueue, QueueStats, WebhookClient, deliver_logged,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Bounded alternative to spawning one task per notification
#[derive(Debug)]
pub struct DispatchPool {
    queue: Arc<JobQueue>,
    ready: Arc<Notify>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchPool {
    /// Spawn `workers` delivery tasks; requires a tokio runtime
    pub fn new(
        client: Arc<WebhookClient>,
        workers: usize,
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        let queue = Arc::new(JobQueue::new(capacity, overflow));
        let ready = Arc::new(Notify::new());
        let workers = workers.max(1);

        let handles = (0..workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let ready = Arc::clone(&ready);
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    loop {
                        match queue.pop() {
                            Some(job) => {
                                debug!("Worker {} delivering event {}", id, job.event_id);
                                let delivered = deliver_logged(&client, &job).await;
                                queue.record_outcome(delivered);
                            }
                            None => ready.notified().await,
                        }
                    }
                })
            })
            .collect();

        info!(
            "Started dispatch pool ({} workers, queue capacity {}, {:?})",
            workers,
            queue.capacity(),
            overflow
        );

        Self {
            queue,
            ready,
            workers: Mutex::new(handles),
        }
    }

    /// Queue a job for the workers
    pub fn submit(&self, job: DispatchJob) {
        match self.queue.push(job) {
            Admission::Queued => self.ready.notify_one(),
            Admission::Evicted(evicted) => {
                debug!(
                    "Evicted event {} after {:?} in queue",
                    evicted.event_id,
                    evicted.queued_at.elapsed()
                );
                self.ready.notify_one();
            }
            Admission::Rejected(rejected) => {
                debug!(
                    "Rejected event {} for {:?}",
                    rejected.event_id, rejected.path
                );
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Abort the workers and discard pending jobs
    pub fn close(&self) {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if workers.is_empty() {
            return;
        }
        for handle in workers.drain(..) {
            handle.abort();
        }
        let discarded = self.queue.clear();
        debug!(
            "Dispatch pool closed ({} pending deliveries discarded)",
            discarded
        );
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use uuid::Uuid;

    async fn wait_for_outcomes(pool: &DispatchPool, expected: u64) -> QueueStats {
        timeout(Duration::from_secs(5), async {
            loop {
                let stats = pool.stats();
                if stats.total_delivered + stats.total_failed >= expected {
                    return stats;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("deliveries did not finish in time")
    }

    #[tokio::test]
    async fn test_pool_delivers_all_jobs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(3)
            .create_async()
            .await;

        let url = format!("{}/hook", server.url());
        let client = Arc::new(WebhookClient::new(&url, "").unwrap());
        let pool = DispatchPool::new(client, 2, 16, OverflowPolicy::DropNewest);

        for name in ["a.csv", "b.csv", "c.csv"] {
            let path = PathBuf::from("/in").join(name);
            pool.submit(DispatchJob::new(path, Uuid::new_v4()));
        }

        let stats = wait_for_outcomes(&pool, 3).await;
        assert_eq!(stats.total_delivered, 3);
        assert_eq!(stats.total_failed, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pool_counts_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(503)
            .create_async()
            .await;

        let url = format!("{}/hook", server.url());
        let client = Arc::new(WebhookClient::new(&url, "").unwrap());
        let pool = DispatchPool::new(client, 1, 4, OverflowPolicy::DropNewest);
        pool.submit(DispatchJob::new(PathBuf::from("/in/a.csv"), Uuid::new_v4()));

        let stats = wait_for_outcomes(&pool, 1).await;
        assert_eq!(stats.total_failed, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = Arc::new(WebhookClient::new("http://127.0.0.1:9/hook", "").unwrap());
        let pool = DispatchPool::new(client, 2, 4, OverflowPolicy::DropOldest);

        pool.close();
        pool.close();
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn test_submit_applies_overflow_policy() {
        let client = Arc::new(WebhookClient::new("http://127.0.0.1:9/hook", "").unwrap());
        let oldest = DispatchPool::new(Arc::clone(&client), 1, 1, OverflowPolicy::DropOldest);
        let newest = DispatchPool::new(client, 1, 1, OverflowPolicy::DropNewest);
        // No workers left to drain the queues.
        oldest.close();
        newest.close();

        for name in ["a.csv", "b.csv", "c.csv"] {
            let path = PathBuf::from("/in").join(name);
            oldest.submit(DispatchJob::new(path.clone(), Uuid::new_v4()));
            newest.submit(DispatchJob::new(path, Uuid::new_v4()));
        }

        assert_eq!(oldest.pending(), 1);
        assert_eq!(oldest.stats().total_enqueued, 3);
        assert_eq!(oldest.stats().total_dropped, 2);

        assert_eq!(newest.pending(), 1);
        assert_eq!(newest.stats().total_enqueued, 1);
        assert_eq!(newest.stats().total_dropped, 2);
    }
}
