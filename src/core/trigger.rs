//! Cycle trigger and scheduler loop.
//!
//! A firing runs one cycle under the retry policy. Only errors that
//! escaped the orchestrator are retried; a recorded failure outcome is
//! terminal. Exhausted retries are logged and swallowed so the scheduler
//! keeps running. Firings never overlap.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn, Span};

use crate::domain::CycleOutcome;

use super::orchestrator::CycleRunner;
use super::retry::RetryPolicy;

/// Fixed cadence aligned to interval boundaries since the Unix epoch.
/// An interval of one hour fires at the top of every hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cadence {
    interval_seconds: u64,
}

impl Cadence {
    /// Longest supported interval (366 days)
    pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 3600);

    /// Intervals are clamped to between one second and [`Self::MAX_INTERVAL`]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_seconds: interval.as_secs().clamp(1, Self::MAX_INTERVAL.as_secs()),
        }
    }

    pub fn hourly() -> Self {
        Self::new(Duration::from_secs(3600))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// First boundary strictly after `now`, saturating at the latest
    /// representable time
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = i64::try_from(self.interval_seconds).unwrap_or(i64::MAX);
        now.timestamp()
            .div_euclid(interval)
            .checked_add(1)
            .and_then(|n| n.checked_mul(interval))
            .and_then(|next| DateTime::<Utc>::from_timestamp(next, 0))
            .or_else(|| {
                TimeDelta::try_seconds(interval).and_then(|step| now.checked_add_signed(step))
            })
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// How long to sleep from `now` until the next boundary
    pub fn until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.next_after(now) - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::hourly()
    }
}

/// What one trigger firing did
#[derive(Debug)]
pub enum Firing {
    /// The cycle reached an outcome (success or recorded failure)
    Completed { outcome: CycleOutcome, attempts: u32 },

    /// Every attempt escaped the orchestrator with an error
    Exhausted { attempts: u32, error: String },

    /// A previous cycle was still running
    Skipped,
}

impl Firing {
    pub fn outcome(&self) -> Option<&CycleOutcome> {
        match self {
            Self::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// Runs cycles on demand or on a cadence, one at a time
pub struct CycleTrigger {
    runner: Arc<dyn CycleRunner>,
    policy: RetryPolicy,
    cadence: Cadence,
    running: Mutex<()>,
}

impl CycleTrigger {
    pub fn new(runner: Arc<dyn CycleRunner>, policy: RetryPolicy, cadence: Cadence) -> Self {
        Self {
            runner,
            policy,
            cadence,
            running: Mutex::new(()),
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Fire once now. Never returns an error.
    #[instrument(skip(self), fields(cycle_id = tracing::field::Empty, date = tracing::field::Empty))]
    pub async fn fire(&self) -> Firing {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous cycle still running, skipping this firing");
            return Firing::Skipped;
        };

        info!(time = %Utc::now().format("%H:%M:%S"), "Starting scheduled data processing task");

        let result = self
            .policy
            .run(|attempt| {
                let runner = Arc::clone(&self.runner);
                async move {
                    if attempt > 1 {
                        info!(attempt, "Retrying cycle");
                    }
                    runner.run_cycle().await.map(|outcome| (outcome, attempt))
                }
            })
            .await;

        match result {
            Ok((outcome, attempts)) => {
                Span::current().record("cycle_id", tracing::field::display(outcome.cycle_id));
                Span::current().record("date", tracing::field::display(outcome.date));
                info!(
                    cycle_id = %outcome.cycle_id,
                    status = %outcome.status(),
                    attempts,
                    duration_ms = outcome.duration_ms(),
                    "Scheduled data processing task finished"
                );
                Firing::Completed { outcome, attempts }
            }
            Err(exhausted) => {
                error!(
                    attempts = exhausted.attempts,
                    error = %exhausted,
                    "Scheduled data processing task failed"
                );
                Firing::Exhausted {
                    attempts: exhausted.attempts,
                    error: exhausted.last_error.to_string(),
                }
            }
        }
    }

    /// Fire on every cadence boundary until `shutdown` resolves.
    ///
    /// A cycle in flight is allowed to finish before shutdown is observed.
    /// Boundaries missed while a cycle ran are skipped, not queued.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let wait = self.cadence.until_next(now);
            info!(next = %self.cadence.next_after(now), "Waiting for next cycle");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Scheduler shutting down");
                    return;
                }
            }

            self.fire().await;
        }
    }
}
