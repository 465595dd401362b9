//! Artifacts written to the object store.
//!
//! A [`StorageArtifact`] lives only between serialization and the write
//! call. The store answers with a [`StoredArtifact`] describing where it
//! went.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dataset::DatasetKind;

/// Deterministic object name: `<kind>_data_<ISO date>`
pub fn artifact_name(kind: DatasetKind, date: NaiveDate) -> String {
    format!("{}_data_{}", kind, date.format("%Y-%m-%d"))
}

/// Serialized dataset awaiting a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageArtifact {
    pub kind: DatasetKind,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl StorageArtifact {
    pub fn new(kind: DatasetKind, date: NaiveDate, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            name: artifact_name(kind, date),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Where an artifact ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub kind: DatasetKind,

    /// Object name inside the bucket
    pub name: String,

    /// Opaque location string returned by the store
    pub location: String,

    pub size_bytes: u64,

    /// Hex SHA-256 of the written bytes, when the store computes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}
