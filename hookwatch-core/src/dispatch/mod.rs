//! Webhook delivery of accepted events
//!
//! Delivery is fire-and-forget from the watcher's point of view: every
//! failure is logged and the notification is dropped. By default each
//! notification gets its own task; a bounded worker pool can be configured
//! instead.

pub mod pool;
pub mod queue;
pub mod webhook;

pub use pool::DispatchPool;
pub use queue::{Admission, DispatchJob, JobQueue, QueueStats};
pub use webhook::{Delivery, NotificationPayload, WEBHOOK_TIMEOUT, WebhookClient};

use crate::config::{DispatchMode, WatchConfig};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Failures of a single delivery
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to resolve absolute path for {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path has no file name component: {0}")]
    NoFileName(PathBuf),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to create request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Failed to send POST request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP POST request failed: {status} - {body}")]
    Status { status: u16, body: String },
}

/// Hands accepted events to the webhook without blocking the caller
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<WebhookClient>,
    pool: Option<Arc<DispatchPool>>,
}

impl Dispatcher {
    /// Build a dispatcher; bounded mode spawns its workers immediately, so
    /// this must run inside a tokio runtime in that case.
    pub fn new(client: WebhookClient, mode: DispatchMode) -> Self {
        let client = Arc::new(client);
        let pool = match mode {
            DispatchMode::Unbounded => None,
            DispatchMode::Bounded {
                workers,
                capacity,
                overflow,
            } => Some(Arc::new(DispatchPool::new(
                Arc::clone(&client),
                workers,
                capacity,
                overflow,
            ))),
        };

        Self { client, pool }
    }

    pub fn from_config(config: &WatchConfig) -> Result<Self, DispatchError> {
        let client = WebhookClient::new(&config.post_url, &config.authentication_header)?;
        Ok(Self::new(client, config.dispatch_mode()))
    }

    pub fn client(&self) -> &WebhookClient {
        &self.client
    }

    /// Pool statistics when running bounded
    pub fn pool_stats(&self) -> Option<QueueStats> {
        self.pool.as_ref().map(|pool| pool.stats())
    }

    /// Send a notification for `path` in the background
    pub fn dispatch(&self, path: PathBuf, event_id: Uuid) {
        let job = DispatchJob::new(path, event_id);

        match &self.pool {
            Some(pool) => pool.submit(job),
            None => {
                let client = Arc::clone(&self.client);
                tokio::spawn(async move {
                    deliver_logged(&client, &job).await;
                });
            }
        }
    }

    /// Stop pool workers; spawned unbounded deliveries are left to finish
    pub fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close();
        }
    }
}

/// Deliver one job and log the outcome; returns whether it succeeded
pub(crate) async fn deliver_logged(client: &WebhookClient, job: &DispatchJob) -> bool {
    debug!(
        "Delivering event {} after {:?} queued",
        job.event_id,
        job.queued_at.elapsed()
    );

    match client.deliver(&job.path, job.event_id).await {
        Ok(delivery) => {
            info!(
                "Successfully posted file info for event {}: {}, {}",
                job.event_id, delivery.payload.filepath, delivery.payload.filename
            );
            true
        }
        Err(e) => {
            error!(
                "Failed to deliver event {} for {:?}: {}",
                job.event_id, job.path, e
            );
            false
        }
    }
}
