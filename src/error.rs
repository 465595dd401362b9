//! Error taxonomy for one acquisition cycle.
//!
//! Acquisition, serialization and storage errors are converted into a
//! FAILURE run record by the orchestrator. Run-log and notification errors
//! are logged and dropped. Only [`CycleError`] escapes `run_cycle`, and it
//! is what the trigger's retry policy retries.

use thiserror::Error;

use crate::domain::DatasetKind;

/// A single dataset could not be fetched from the provider
#[derive(Debug, Clone, Error)]
#[error("Error occurred while fetching {kind} data: {cause}")]
pub struct AcquisitionError {
    /// Which dataset failed
    pub kind: DatasetKind,

    /// Human-readable cause (transport, decode or client error text)
    pub cause: String,

    /// HTTP status code when the provider rejected the request
    pub status: Option<u16>,
}

impl AcquisitionError {
    pub fn new(kind: DatasetKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
            status: None,
        }
    }

    /// Build an error for a request the provider rejected with a 4xx
    pub fn client_error(kind: DatasetKind, status: u16) -> Self {
        Self {
            kind,
            cause: format!("provider rejected request with status {}", status),
            status: Some(status),
        }
    }
}

/// A dataset could not be encoded into bytes
#[derive(Debug, Error)]
#[error("Failed to serialize {kind} data: {source}")]
pub struct SerializationError {
    pub kind: DatasetKind,
    #[source]
    pub source: serde_json::Error,
}

/// An artifact could not be written to the object store
#[derive(Debug, Error)]
#[error("Failed to write artifact '{name}': {reason}")]
pub struct StorageWriteError {
    pub name: String,
    pub reason: String,
}

/// The run log could not record an entry
#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("Run log database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Run log is unavailable: {0}")]
    Unavailable(String),

    #[error("Run log row is malformed: {0}")]
    Malformed(String),
}

/// A notification could not be published
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid message: message must not be null or empty")]
    EmptyMessage,

    #[error("Error while sending message to topic '{topic}': {reason}")]
    Transport { topic: String, reason: String },
}

/// Unexpected failure that escaped the orchestrator's own failure path
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{kind} acquisition task did not complete: {reason}")]
    TaskAborted { kind: DatasetKind, reason: String },
}

/// Every attempt allowed by the retry policy failed
#[derive(Debug, Error)]
#[error("Gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub last_error: E,
}
