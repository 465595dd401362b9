//! Adapter interfaces for external systems.
//!
//! The orchestrator only sees these four capabilities. Each has one
//! concrete implementation here; tests supply in-memory ones.

pub mod notifier;
pub mod object_store;
pub mod provider;
pub mod run_log;

use async_trait::async_trait;

use crate::domain::{Dataset, DatasetKind, RunRecord, StorageArtifact, StoredArtifact};
use crate::error::{AcquisitionError, NotificationError, RunLogError, StorageWriteError};

pub use notifier::{HttpNotifier, OutboxNotifier};
pub use object_store::FsObjectStore;
pub use provider::AlphaVantageClient;
pub use run_log::SqliteRunLog;

/// Fetches one dataset from the market-data provider
#[async_trait]
pub trait AcquisitionClient: Send + Sync {
    async fn fetch(&self, kind: DatasetKind) -> Result<Dataset, AcquisitionError>;
}

/// Persists named byte blobs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the artifact, returning where it was stored
    async fn write(&self, artifact: StorageArtifact) -> Result<StoredArtifact, StorageWriteError>;
}

/// Append-only record of cycle outcomes
#[async_trait]
pub trait RunLog: Send + Sync {
    async fn append(&self, record: &RunRecord) -> Result<(), RunLogError>;
}

/// Publishes a status string to a single logical channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), NotificationError>;
}

/// Reject empty or whitespace-only messages before they reach a transport
pub(crate) fn validate_message(message: &str) -> Result<(), NotificationError> {
    if message.trim().is_empty() {
        return Err(NotificationError::EmptyMessage);
    }
    Ok(())
}
