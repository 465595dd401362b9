//! SQLite-backed run log.
//!
//! One row per record, insert-only. The connection is shared behind a
//! mutex and every statement runs on tokio's blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use super::RunLog;
use crate::domain::{RunRecord, RunStatus};
use crate::error::RunLogError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS run_log (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle_id           TEXT NOT NULL,
    run_date           TEXT NOT NULL,
    status             TEXT NOT NULL,
    location_or_reason TEXT NOT NULL,
    recorded_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_run_log_cycle ON run_log(cycle_id);
";

/// Run log stored in a SQLite database
#[derive(Clone)]
pub struct SqliteRunLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunLog {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RunLogError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RunLogError::Unavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, RunLogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RunLogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, RunLogError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RunLogError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| RunLogError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| RunLogError::Unavailable(format!("run log task failed: {}", e)))?
    }

    /// Most recent records first
    pub async fn recent(&self, limit: usize) -> Result<Vec<RunRecord>, RunLogError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cycle_id, run_date, status, location_or_reason, recorded_at
                 FROM run_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (cycle_id, run_date, status, location_or_reason, recorded_at) = row?;
                records.push(parse_row(
                    &cycle_id,
                    &run_date,
                    &status,
                    location_or_reason,
                    &recorded_at,
                )?);
            }
            Ok(records)
        })
        .await
    }

    /// Records written by one cycle, in append order
    pub async fn for_cycle(&self, cycle_id: Uuid) -> Result<Vec<RunRecord>, RunLogError> {
        let mut records: Vec<RunRecord> = self
            .recent(usize::MAX)
            .await?
            .into_iter()
            .filter(|r| r.cycle_id == cycle_id)
            .collect();
        records.reverse();
        Ok(records)
    }
}

fn parse_row(
    cycle_id: &str,
    run_date: &str,
    status: &str,
    location_or_reason: String,
    recorded_at: &str,
) -> Result<RunRecord, RunLogError> {
    let cycle_id = Uuid::parse_str(cycle_id)
        .map_err(|e| RunLogError::Malformed(format!("cycle_id '{}': {}", cycle_id, e)))?;
    let date = NaiveDate::parse_from_str(run_date, "%Y-%m-%d")
        .map_err(|e| RunLogError::Malformed(format!("run_date '{}': {}", run_date, e)))?;
    let status: RunStatus = status.parse().map_err(RunLogError::Malformed)?;
    let recorded_at = DateTime::parse_from_rfc3339(recorded_at)
        .map_err(|e| RunLogError::Malformed(format!("recorded_at '{}': {}", recorded_at, e)))?
        .with_timezone(&Utc);

    Ok(RunRecord {
        cycle_id,
        date,
        status,
        location_or_reason,
        recorded_at,
    })
}

#[async_trait]
impl RunLog for SqliteRunLog {
    async fn append(&self, record: &RunRecord) -> Result<(), RunLogError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO run_log (cycle_id, run_date, status, location_or_reason, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.cycle_id.to_string(),
                    record.date.format("%Y-%m-%d").to_string(),
                    record.status.as_str(),
                    record.location_or_reason,
                    record.recorded_at.to_rfc3339(),
                ],
            )?;
            debug!(status = %record.status, date = %record.date, "Run record appended");
            Ok(())
        })
        .await
    }
}
