//! marketfeed - Scheduled market-data acquisition pipeline
//!
//! Every cycle fetches a stock time series and a news-sentiment feed in
//! parallel, writes both to an object store, appends the outcome to a run
//! log and publishes one notification.
//!
//! # Architecture
//!
//! ```text
//! CycleTrigger (cadence + retry)
//!   -> Orchestrator
//!        -> AcquisitionClient x2 (parallel) -> join
//!        -> serialize -> ObjectStore
//!        -> RunLog -> Notifier
//! ```
//!
//! A failed fetch, encode or write turns the cycle into one aggregate
//! FAILURE record plus one failure notification. Run-log and notifier
//! errors are logged, never raised.
//!
//! # Modules
//!
//! - `adapters`: Collaborator traits and their implementations
//! - `core`: Orchestrator, retry policy and trigger
//! - `domain`: Datasets, run records, artifacts, cycle outcomes
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run one cycle now
//! marketfeed run
//!
//! # Run every hour on the hour
//! marketfeed schedule
//!
//! # Inspect the run log
//! marketfeed runs --limit 20
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use self::core::{Cadence, CycleRunner, CycleTrigger, Firing, Orchestrator, RetryPolicy};
pub use domain::{CycleOutcome, CycleState, Dataset, DatasetKind, RunRecord, RunStatus};
pub use error::{
    AcquisitionError, CycleError, NotificationError, RetryExhausted, RunLogError,
    SerializationError, StorageWriteError,
};
