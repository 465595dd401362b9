//! Run-log records.
//!
//! A cycle appends one SUCCESS record per dataset, or a single aggregate
//! FAILURE record. Records are never updated or deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded for an artifact or a whole cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// One append-only audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Cycle this record belongs to
    pub cycle_id: Uuid,

    /// Calendar date the cycle ran for
    pub date: NaiveDate,

    pub status: RunStatus,

    /// Artifact location on success, failure reason otherwise
    pub location_or_reason: String,

    /// When the record was created
    pub recorded_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(
        cycle_id: Uuid,
        date: NaiveDate,
        status: RunStatus,
        location_or_reason: impl Into<String>,
    ) -> Self {
        Self {
            cycle_id,
            date,
            status,
            location_or_reason: location_or_reason.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn success(cycle_id: Uuid, date: NaiveDate, location: impl Into<String>) -> Self {
        Self::new(cycle_id, date, RunStatus::Success, location)
    }

    pub fn failure(cycle_id: Uuid, date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::new(cycle_id, date, RunStatus::Failure, reason)
    }
}
