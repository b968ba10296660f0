//! Single-flight run execution and periodic triggering
//!
//! At most one run is active process-wide at any instant. The guard is
//! claimed with an atomic compare-exchange before the first suspension
//! point and released by a drop guard, so the flag cannot stay stuck
//! after any exit path. Periodic ticks invoke the same `run_once`; an
//! error from an unattended tick is recorded and logged, never allowed
//! to stop future ticks.

use crate::config::RunConfig;
use crate::db::{catalog, runs, settings};
use crate::services::aggregator::SearchAggregator;
use crate::services::importer::{BatchOutcome, DatasetImporter};
use crate::services::{categorizer, fan_out};
use crate::types::{default_queries, SearchQuery, TrackCandidate};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggeredBy {
    Manual,
    Auto,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::Manual => "manual",
            TriggeredBy::Auto => "auto",
        }
    }
}

/// Result of one `run_once` invocation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A run was already active; no new work started
    Busy,
    Ok {
        added: i64,
        skipped: i64,
        failed: i64,
        dataset: BatchOutcome,
    },
    Error {
        error: String,
    },
}

/// In-memory runtime view of the coordinator
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeState {
    pub running: bool,
    pub interval_minutes: u64,
    pub max_items_per_run: usize,
    pub fetch_concurrency: usize,
}

struct RunStats {
    added: i64,
    skipped: i64,
    failed: i64,
    dataset: BatchOutcome,
}

/// Releases the single-flight guard on every exit path
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RunCoordinator {
    db: SqlitePool,
    aggregator: Arc<SearchAggregator>,
    importer: Arc<DatasetImporter>,
    config: RunConfig,
    in_flight: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl RunCoordinator {
    pub fn new(
        db: SqlitePool,
        aggregator: Arc<SearchAggregator>,
        importer: Arc<DatasetImporter>,
        config: RunConfig,
    ) -> Self {
        Self {
            db,
            aggregator,
            importer,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            ticker: Mutex::new(None),
        }
    }

    /// Execute one full ingestion run unless one is already active
    pub async fn run_once(&self, triggered_by: TriggeredBy) -> RunOutcome {
        // Claim the guard before the first await
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return RunOutcome::Busy;
        }
        let _guard = FlightGuard(Arc::clone(&self.in_flight));

        let record = runs::RunRecord::start(triggered_by.as_str());
        tracing::info!(
            run_id = %record.run_id,
            triggered_by = triggered_by.as_str(),
            "Run started"
        );

        if let Err(error) = runs::start_run(&self.db, &record).await {
            tracing::error!(error = %error, "Failed to persist run start");
            return RunOutcome::Error {
                error: error.to_string(),
            };
        }
        if let Err(error) = runs::mark_run_started(&self.db, triggered_by.as_str()).await {
            tracing::warn!(error = %error, "Failed to mark scheduler state running");
        }

        let result = self.execute().await;

        match result {
            Ok(stats) => {
                if let Err(error) = runs::mark_run_completed(
                    &self.db,
                    stats.added,
                    stats.skipped,
                    None,
                    Some(stats.dataset.status.as_str()),
                    stats.dataset.added,
                    stats.dataset.skipped,
                )
                .await
                {
                    tracing::warn!(error = %error, "Failed to persist run completion");
                }
                if let Err(error) = runs::complete_run(
                    &self.db,
                    record.run_id,
                    stats.added,
                    stats.skipped,
                    Some(stats.dataset.status.as_str()),
                    None,
                )
                .await
                {
                    tracing::warn!(error = %error, "Failed to persist run record");
                }

                tracing::info!(
                    run_id = %record.run_id,
                    added = stats.added,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Run completed"
                );

                RunOutcome::Ok {
                    added: stats.added,
                    skipped: stats.skipped,
                    failed: stats.failed,
                    dataset: stats.dataset,
                }
            }
            Err(error) => {
                let message = error.to_string();
                tracing::error!(run_id = %record.run_id, error = %message, "Run failed");

                if let Err(db_error) = runs::clear_running(&self.db, Some(&message)).await {
                    tracing::warn!(error = %db_error, "Failed to persist run error state");
                }
                if let Err(db_error) =
                    runs::complete_run(&self.db, record.run_id, 0, 0, None, Some(&message)).await
                {
                    tracing::warn!(error = %db_error, "Failed to persist run record");
                }

                RunOutcome::Error { error: message }
            }
        }
    }

    /// Run body: dataset stage, then query-driven candidate stage
    async fn execute(&self) -> anyhow::Result<RunStats> {
        let dataset = self.importer.import_batch(None).await;

        let queries = settings::get_queries(&self.db)
            .await?
            .unwrap_or_else(default_queries);
        let candidates = self.harvest_candidates(&queries).await;

        let added = Arc::new(AtomicI64::new(0));
        let skipped = Arc::new(AtomicI64::new(0));
        let max_added = self.config.max_items_per_run as i64;

        let db = self.db.clone();
        let added_counter = Arc::clone(&added);
        let skipped_counter = Arc::clone(&skipped);

        let results = fan_out::run_bounded(
            self.config.fetch_concurrency,
            candidates,
            move |(track, hint_categories): (TrackCandidate, Vec<String>)| {
                let db = db.clone();
                let added = Arc::clone(&added_counter);
                let skipped = Arc::clone(&skipped_counter);
                async move {
                    if added.load(Ordering::SeqCst) >= max_added {
                        return Ok(());
                    }
                    if track.id.is_empty() {
                        return Ok(());
                    }
                    if catalog::exists(&db, &track.id).await? {
                        skipped.fetch_add(1, Ordering::SeqCst);
                        return Ok(());
                    }
                    let categories = categorizer::classify(&track, &hint_categories);
                    catalog::save_track(&db, &track, &categories).await?;
                    added.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        let mut failed: i64 = 0;
        for result in &results {
            if let Err(error) = result {
                failed += 1;
                tracing::warn!(error = %error, "Candidate persist failed");
            }
        }

        Ok(RunStats {
            added: added.load(Ordering::SeqCst),
            skipped: skipped.load(Ordering::SeqCst),
            failed,
            dataset,
        })
    }

    /// Expand configured queries into a bounded candidate list
    ///
    /// Harvesting stops once three times the per-run cap has been
    /// gathered; candidates without a playable asset are dropped here.
    async fn harvest_candidates(
        &self,
        queries: &[SearchQuery],
    ) -> Vec<(TrackCandidate, Vec<String>)> {
        let cap = self.config.max_items_per_run * 3;
        let mut candidates = Vec::new();

        for query in queries {
            if candidates.len() >= cap {
                break;
            }
            let results = self.aggregator.search(&query.query, query.force_desi).await;
            for track in results {
                if track.has_audio() {
                    candidates.push((track, query.categories.clone()));
                }
            }
        }

        candidates
    }

    /// Begin the periodic trigger; idempotent
    pub async fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return;
        }

        let coordinator = Arc::clone(self);
        let period = self.config.interval();
        *ticker = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                match coordinator.run_once(TriggeredBy::Auto).await {
                    RunOutcome::Error { error } => {
                        tracing::warn!(error = %error, "Unattended run failed");
                    }
                    RunOutcome::Busy => {
                        tracing::debug!("Unattended run skipped: already running");
                    }
                    RunOutcome::Ok { .. } => {}
                }
            }
        }));

        tracing::info!(
            interval_minutes = self.config.interval_minutes,
            "Periodic trigger started"
        );
    }

    /// Cancel the periodic trigger; does not cancel an in-flight run
    pub async fn stop(&self) {
        let mut ticker = self.ticker.lock().await;
        if let Some(handle) = ticker.take() {
            handle.abort();
            tracing::info!("Periodic trigger stopped");
        }
    }

    /// Persist the enabled flag and start or stop the trigger accordingly
    pub async fn set_enabled(self: &Arc<Self>, enabled: bool) -> crate::error::Result<()> {
        runs::set_scheduler_enabled(&self.db, enabled).await?;
        if enabled {
            self.start().await;
        } else {
            self.stop().await;
        }
        Ok(())
    }

    /// Startup hook: honor the persisted enabled flag
    ///
    /// When enabled, starts the periodic trigger and kicks off one
    /// immediate unattended run in the background.
    pub async fn init(self: &Arc<Self>) -> crate::error::Result<()> {
        let state = runs::load_scheduler_state(&self.db).await?;
        if state.enabled {
            self.start().await;
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                if let RunOutcome::Error { error } =
                    coordinator.run_once(TriggeredBy::Auto).await
                {
                    tracing::warn!(error = %error, "Startup run failed");
                }
            });
        }
        Ok(())
    }

    pub fn state(&self) -> RuntimeState {
        RuntimeState {
            running: self.in_flight.load(Ordering::SeqCst),
            interval_minutes: self.config.interval_minutes,
            max_items_per_run: self.config.max_items_per_run,
            fetch_concurrency: self.config.fetch_concurrency,
        }
    }
}
