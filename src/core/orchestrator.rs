//! Cycle orchestrator.
//!
//! Runs one acquisition cycle: fetches both datasets in parallel, joins
//! on both, commits them to the object store, writes the run log and
//! publishes exactly one notification. Any acquisition, serialization or
//! write failure diverts the cycle to a single aggregate FAILURE record.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

use crate::adapters::{
    AcquisitionClient, AlphaVantageClient, FsObjectStore, HttpNotifier, Notifier, ObjectStore,
    OutboxNotifier, RunLog, SqliteRunLog,
};
use crate::config::{NotifyTarget, ResolvedConfig};
use crate::domain::{CycleOutcome, CycleState, Dataset, DatasetKind, RunRecord, StoredArtifact};
use crate::error::{AcquisitionError, CycleError};

use super::serialize::to_artifact;

/// Today's date in the local timezone
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Anything the trigger can run as one cycle
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run one cycle. `Err` means the cycle could not reach its own
    /// failure path; a recorded failure is still `Ok`.
    async fn run_cycle(&self) -> Result<CycleOutcome, CycleError>;
}

/// Per-cycle identity shared by every step
struct CycleContext {
    cycle_id: Uuid,
    date: NaiveDate,
    started_at: DateTime<Utc>,
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    client: Arc<dyn AcquisitionClient>,
    store: Arc<dyn ObjectStore>,
    run_log: Arc<dyn RunLog>,
    notifier: Arc<dyn Notifier>,
    today: fn() -> NaiveDate,
}

impl Orchestrator {
    /// Create an orchestrator over the four collaborators
    pub fn new(
        client: Arc<dyn AcquisitionClient>,
        store: Arc<dyn ObjectStore>,
        run_log: Arc<dyn RunLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            store,
            run_log,
            notifier,
            today: local_today,
        }
    }

    /// Replace the date source
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Build the production collaborators from configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        if config.provider.api_token.is_empty() {
            warn!("No API token configured; provider requests will likely be rejected");
        }

        let client = AlphaVantageClient::from_settings(&config.provider)
            .context("Failed to build provider HTTP client")?;
        let store = FsObjectStore::new(&config.storage_root, &config.bucket);
        let run_log = SqliteRunLog::open(&config.run_log_path).with_context(|| {
            format!("Failed to open run log: {}", config.run_log_path.display())
        })?;
        let notifier: Arc<dyn Notifier> = match &config.notify {
            NotifyTarget::Http { endpoint } => {
                Arc::new(HttpNotifier::new(endpoint.clone(), config.topic.clone()))
            }
            NotifyTarget::Outbox { path } => {
                Arc::new(OutboxNotifier::new(path.clone(), config.topic.clone()))
            }
        };

        Ok(Self::new(
            Arc::new(client),
            Arc::new(store),
            Arc::new(run_log),
            notifier,
        ))
    }

    /// Run one full cycle for "today"
    #[instrument(skip(self), fields(cycle_id = tracing::field::Empty, date = tracing::field::Empty))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let ctx = CycleContext {
            cycle_id: Uuid::new_v4(),
            date: (self.today)(),
            started_at: Utc::now(),
        };
        Span::current().record("cycle_id", tracing::field::display(ctx.cycle_id));
        Span::current().record("date", tracing::field::display(ctx.date));
        info!("Executing and saving data process started");

        // Fan out; neither task is cancelled if its sibling fails
        let stock_task = self.spawn_fetch(DatasetKind::Stock);
        let news_task = self.spawn_fetch(DatasetKind::News);
        let (stock, news) = tokio::join!(stock_task, news_task);

        let stock = stock.map_err(|e| CycleError::TaskAborted {
            kind: DatasetKind::Stock,
            reason: e.to_string(),
        })?;
        let news = news.map_err(|e| CycleError::TaskAborted {
            kind: DatasetKind::News,
            reason: e.to_string(),
        })?;

        let (stock, news) = match (stock, news) {
            (Ok(stock), Ok(news)) => (stock, news),
            (stock, news) => {
                let reason = join_errors([stock.err(), news.err()]);
                return Ok(self.fail(ctx, reason, Vec::new()).await);
            }
        };

        // Serialize both before writing either
        let (stock, news) = match (to_artifact(&stock, ctx.date), to_artifact(&news, ctx.date)) {
            (Ok(stock), Ok(news)) => (stock, news),
            (stock, news) => {
                let reason = join_errors([stock.err(), news.err()]);
                return Ok(self.fail(ctx, reason, Vec::new()).await);
            }
        };

        // Writes are unordered relative to each other; both run to completion
        let (stock, news) = tokio::join!(self.store.write(stock), self.store.write(news));

        let mut written = Vec::new();
        let mut failures = Vec::new();
        for result in [stock, news] {
            match result {
                Ok(stored) => written.push(stored),
                Err(e) => failures.push(e),
            }
        }

        if !failures.is_empty() {
            let mut reason = join_errors(failures.into_iter().map(Some));
            if !written.is_empty() {
                let kept = written
                    .iter()
                    .map(|a| format!("{} at {}", a.name, a.location))
                    .collect::<Vec<_>>()
                    .join(", ");
                reason.push_str(&format!(" (already written: {})", kept));
            }
            return Ok(self.fail(ctx, reason, written).await);
        }

        Ok(self.succeed(ctx, written).await)
    }

    fn spawn_fetch(&self, kind: DatasetKind) -> JoinHandle<Result<Dataset, AcquisitionError>> {
        let client = Arc::clone(&self.client);
        tokio::spawn(
            async move {
                let dataset = client.fetch(kind).await?;
                if dataset.kind() != kind {
                    return Err(AcquisitionError::new(
                        kind,
                        format!("provider returned {} data", dataset.kind()),
                    ));
                }
                Ok(dataset)
            }
            .instrument(tracing::info_span!("fetch", %kind)),
        )
    }

    async fn succeed(&self, ctx: CycleContext, artifacts: Vec<StoredArtifact>) -> CycleOutcome {
        let mut records_appended = 0;
        for artifact in &artifacts {
            let record = RunRecord::success(ctx.cycle_id, ctx.date, artifact.location.clone());
            match self.run_log.append(&record).await {
                Ok(()) => records_appended += 1,
                Err(e) => error!(kind = %artifact.kind, error = %e, "Failed to append run record"),
            }
        }

        let notified = self
            .notify(&format!("Data saved successfully for {}", ctx.date))
            .await;
        info!(records_appended, notified, "Data saved successfully");

        self.finish(ctx, CycleState::Succeeded, artifacts, records_appended, notified)
    }

    async fn fail(
        &self,
        ctx: CycleContext,
        reason: String,
        artifacts: Vec<StoredArtifact>,
    ) -> CycleOutcome {
        error!(%reason, "Cycle failed");

        let record = RunRecord::failure(ctx.cycle_id, ctx.date, reason.clone());
        let records_appended = match self.run_log.append(&record).await {
            Ok(()) => 1,
            Err(e) => {
                error!(error = %e, "Failed to append failure record");
                0
            }
        };

        let notified = self
            .notify(&format!("Data saving failed for {}: {}", ctx.date, reason))
            .await;

        self.finish(
            ctx,
            CycleState::Failed { reason },
            artifacts,
            records_appended,
            notified,
        )
    }

    /// Publish once; a failed publish is logged, never retried
    async fn notify(&self, message: &str) -> bool {
        match self.notifier.publish(message).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to publish notification");
                false
            }
        }
    }

    fn finish(
        &self,
        ctx: CycleContext,
        state: CycleState,
        artifacts: Vec<StoredArtifact>,
        records_appended: usize,
        notified: bool,
    ) -> CycleOutcome {
        CycleOutcome {
            cycle_id: ctx.cycle_id,
            date: ctx.date,
            state,
            artifacts,
            records_appended,
            notified,
            started_at: ctx.started_at,
            completed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl CycleRunner for Orchestrator {
    async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        Orchestrator::run_cycle(self).await
    }
}

/// Join the messages of whichever errors are present
fn join_errors<E, I>(errors: I) -> String
where
    E: std::fmt::Display,
    I: IntoIterator<Item = Option<E>>,
{
    errors
        .into_iter()
        .flatten()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
