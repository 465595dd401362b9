//! Result of one acquisition cycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::StoredArtifact;
use super::record::RunStatus;

/// Terminal state of a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CycleState {
    /// Both datasets were fetched and written
    Succeeded,

    /// The cycle took the failure path
    Failed { reason: String },
}

/// Everything a caller can observe about one finished cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,

    /// Date the cycle ran for (artifact names and records use it)
    pub date: NaiveDate,

    pub state: CycleState,

    /// Artifacts that were actually written, including any written before
    /// the cycle failed
    pub artifacts: Vec<StoredArtifact>,

    /// Run-log appends that succeeded
    pub records_appended: usize,

    /// Whether the single notification was accepted by the notifier
    pub notified: bool,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.state, CycleState::Succeeded)
    }

    pub fn status(&self) -> RunStatus {
        match self.state {
            CycleState::Succeeded => RunStatus::Success,
            CycleState::Failed { .. } => RunStatus::Failure,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            CycleState::Failed { reason } => Some(reason),
            CycleState::Succeeded => None,
        }
    }

    /// Wall-clock duration of the cycle in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
