//! HTTP client for the automation webhook

use crate::dispatch::DispatchError;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::path::{MAIN_SEPARATOR, Path};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Timeout for the whole request/response cycle
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON body posted for each accepted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    /// Containing directory, always ending with a separator
    pub filepath: String,
    pub filename: String,
    pub event_id: String,
}

impl NotificationPayload {
    /// Split an absolute path into directory and file name
    pub fn from_path(path: &Path, event_id: Uuid) -> Option<Self> {
        let filename = path.file_name()?.to_string_lossy().into_owned();
        let mut filepath = path.parent()?.to_string_lossy().into_owned();
        if !filepath.ends_with(MAIN_SEPARATOR) {
            filepath.push(MAIN_SEPARATOR);
        }

        Some(Self {
            filepath,
            filename,
            event_id: event_id.to_string(),
        })
    }
}

/// Outcome of a successful delivery
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: u16,
    pub payload: NotificationPayload,
}

/// Posts notification payloads to the configured URL
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
    authorization: String,
}

impl WebhookClient {
    pub fn new(url: &str, authorization: &str) -> Result<Self, DispatchError> {
        Self::with_timeout(url, authorization, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(
        url: &str,
        authorization: &str,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DispatchError::Client)?;

        Ok(Self {
            client,
            url: url.to_string(),
            authorization: authorization.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post the notification for `path` and wait for the response
    pub async fn deliver(&self, path: &Path, event_id: Uuid) -> Result<Delivery, DispatchError> {
        let absolute = std::path::absolute(path).map_err(|source| DispatchError::Path {
            path: path.to_path_buf(),
            source,
        })?;

        let payload = NotificationPayload::from_path(&absolute, event_id)
            .ok_or_else(|| DispatchError::NoFileName(absolute.clone()))?;
        let body = serde_json::to_vec(&payload)?;

        let request = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .build()
            .map_err(DispatchError::Request)?;

        info!(
            "Sending HTTP POST request for event {}: {}",
            event_id,
            absolute.display()
        );

        let response = self
            .client
            .execute(request)
            .await
            .map_err(DispatchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Delivery {
            status: status.as_u16(),
            payload,
        })
    }
}
