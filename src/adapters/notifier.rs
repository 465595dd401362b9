//! Notification transports.
//!
//! `HttpNotifier` posts to a message-bus bridge endpoint; `OutboxNotifier`
//! appends JSONL lines to a local outbox file for a relay to pick up.
//! Neither retries: a failed publish is reported once and left to the
//! caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{validate_message, Notifier};
use crate::error::NotificationError;

/// Body sent to the bus bridge and written to the outbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Publishes through an HTTP bridge in front of the message bus
pub struct HttpNotifier {
    endpoint: String,
    topic: String,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: topic.into(),
            client: reqwest::Client::new(),
        }
    }

    fn transport_error(&self, reason: impl Into<String>) -> NotificationError {
        NotificationError::Transport {
            topic: self.topic.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn publish(&self, message: &str) -> Result<(), NotificationError> {
        validate_message(message)?;
        info!(topic = %self.topic, %message, "Sending notification");

        let body = BusMessage {
            topic: self.topic.clone(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.transport_error(format!("bridge returned {}: {}", status, text.trim())));
        }

        Ok(())
    }
}

/// Appends messages to a JSONL outbox file
pub struct OutboxNotifier {
    outbox_path: PathBuf,
    topic: String,
}

impl OutboxNotifier {
    pub fn new(outbox_path: impl Into<PathBuf>, topic: impl Into<String>) -> Self {
        Self {
            outbox_path: outbox_path.into(),
            topic: topic.into(),
        }
    }

    /// Get the outbox file path
    pub fn outbox_path(&self) -> &Path {
        &self.outbox_path
    }

    /// Read back every message in the outbox
    pub async fn read_all(&self) -> std::io::Result<Vec<BusMessage>> {
        if !self.outbox_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.outbox_path).await?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(std::io::Error::from))
            .collect()
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.outbox_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.outbox_path)
            .await?;

        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn publish(&self, message: &str) -> Result<(), NotificationError> {
        validate_message(message)?;
        info!(topic = %self.topic, %message, "Writing notification to outbox");

        let body = BusMessage {
            topic: self.topic.clone(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&body).map_err(|e| NotificationError::Transport {
            topic: self.topic.clone(),
            reason: e.to_string(),
        })?;

        self.append(&json)
            .await
            .map_err(|e| NotificationError::Transport {
                topic: self.topic.clone(),
                reason: format!("outbox {}: {}", self.outbox_path.display(), e),
            })
    }
}
