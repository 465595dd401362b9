//! Dataset -> artifact bytes.

use chrono::NaiveDate;

use crate::domain::{Dataset, StorageArtifact};
use crate::error::SerializationError;

/// Encode a dataset as JSON bytes
pub fn to_json_bytes(dataset: &Dataset) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(dataset).map_err(|source| SerializationError {
        kind: dataset.kind(),
        source,
    })
}

/// Serialize a dataset into the artifact named for `date`
pub fn to_artifact(dataset: &Dataset, date: NaiveDate) -> Result<StorageArtifact, SerializationError> {
    Ok(StorageArtifact::new(dataset.kind(), date, to_json_bytes(dataset)?))
}
