//! Core pipeline logic.
//!
//! This module contains:
//! - Orchestrator: One fan-out/fan-in acquisition cycle
//! - Serialize: Dataset to artifact bytes
//! - Retry: Bounded fixed-delay retry policy
//! - Trigger: Non-overlapping firings on a fixed cadence

pub mod orchestrator;
pub mod retry;
pub mod serialize;
pub mod trigger;

// Re-export commonly used types
pub use orchestrator::{local_today, CycleRunner, Orchestrator};
pub use retry::RetryPolicy;
pub use serialize::{to_artifact, to_json_bytes};
pub use trigger::{Cadence, CycleTrigger, Firing};
