//! Domain types for the marketfeed pipeline.
//!
//! This module contains the core data structures:
//! - Dataset: Typed provider payloads (stock series, news feed)
//! - RunRecord: Append-only audit entries
//! - Artifact: Serialized datasets and their stored locations
//! - CycleOutcome: What one cycle did

pub mod artifact;
pub mod dataset;
pub mod outcome;
pub mod record;

// Re-export commonly used types
pub use artifact::{artifact_name, StorageArtifact, StoredArtifact};
pub use dataset::{Dataset, DatasetKind, NewsFeed, StockSeries};
pub use outcome::{CycleOutcome, CycleState};
pub use record::{RunRecord, RunStatus};
