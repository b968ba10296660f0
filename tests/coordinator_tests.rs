//! Run coordinator tests: single-flight, caps, dedup, persisted state

mod helpers;

use firefly_ingest::config::RunConfig;
use firefly_ingest::db::{catalog, runs, settings};
use firefly_ingest::services::{BatchStatus, DatasetImporter, RunCoordinator, RunOutcome, TriggeredBy};
use firefly_ingest::types::SearchQuery;
use helpers::{aggregator, dataset_config, pool, track, track_without_audio, ProviderScript, ScriptedProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

fn run_config(max_items: usize) -> RunConfig {
    RunConfig {
        interval_minutes: 360,
        max_items_per_run: max_items,
        fetch_concurrency: 1,
    }
}

fn coordinator(
    db: &SqlitePool,
    primary: Arc<ScriptedProvider>,
    max_items: usize,
) -> Arc<RunCoordinator> {
    let secondary = ScriptedProvider::new("secondary", ProviderScript::Empty);
    let agg = aggregator(primary, secondary);
    let importer = Arc::new(
        DatasetImporter::new(db.clone(), agg.clone(), dataset_config(None, 10))
            .expect("importer"),
    );
    Arc::new(RunCoordinator::new(
        db.clone(),
        agg,
        importer,
        run_config(max_items),
    ))
}

async fn single_query(db: &SqlitePool, query: &str, categories: &[&str]) {
    settings::set_queries(
        db,
        &[SearchQuery {
            query: query.to_string(),
            force_desi: false,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn concurrent_triggers_yield_exactly_one_run() {
    let db = pool().await;
    single_query(&db, "hindi hits", &[]).await;

    let primary = ScriptedProvider::slow(
        "primary",
        ProviderScript::Results(vec![track("jio_1", "Song", "Artist")]),
        Duration::from_millis(50),
    );
    let coord = coordinator(&db, primary, 50);

    let (first, second) = tokio::join!(
        coord.run_once(TriggeredBy::Manual),
        coord.run_once(TriggeredBy::Manual),
    );

    let outcomes = [first, second];
    let busy = outcomes
        .iter()
        .filter(|o| matches!(o, RunOutcome::Busy))
        .count();
    let ok = outcomes
        .iter()
        .filter(|o| matches!(o, RunOutcome::Ok { .. }))
        .count();
    assert_eq!(busy, 1);
    assert_eq!(ok, 1);

    // The busy invocation leaves no trace
    let records = runs::recent_runs(&db, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].completed_at.is_some());

    assert!(!coord.state().running, "guard released after the run");
}

#[tokio::test]
async fn run_persists_new_candidates_and_rerun_dedups() {
    let db = pool().await;
    single_query(&db, "workout mix", &["workout"]).await;

    let primary = ScriptedProvider::new(
        "primary",
        ProviderScript::Results(vec![
            track("jio_1", "Song One", "Artist"),
            track("jio_2", "Song Two", "Artist"),
        ]),
    );
    let coord = coordinator(&db, primary, 50);

    match coord.run_once(TriggeredBy::Manual).await {
        RunOutcome::Ok { added, skipped, .. } => {
            assert_eq!(added, 2);
            assert_eq!(skipped, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    match coord.run_once(TriggeredBy::Manual).await {
        RunOutcome::Ok { added, skipped, .. } => {
            assert_eq!(added, 0);
            assert_eq!(skipped, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(catalog::read_counter(&db, "total_tracks").await.unwrap(), 2);

    // Query hint categories land on persisted tracks
    let categories = catalog::categories(&db).await.unwrap();
    let workout = categories
        .iter()
        .find(|c| c.id == "workout")
        .expect("hint category present");
    assert_eq!(workout.count, 2);

    let records = runs::recent_runs(&db, 10).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn added_candidates_stop_at_the_per_run_cap() {
    let db = pool().await;
    single_query(&db, "hindi hits", &[]).await;

    let primary = ScriptedProvider::new(
        "primary",
        ProviderScript::Results(vec![
            track("jio_1", "Song One", "Artist"),
            track("jio_2", "Song Two", "Artist"),
            track("jio_3", "Song Three", "Artist"),
        ]),
    );
    let coord = coordinator(&db, primary, 1);

    match coord.run_once(TriggeredBy::Manual).await {
        RunOutcome::Ok { added, .. } => assert_eq!(added, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(catalog::read_counter(&db, "total_tracks").await.unwrap(), 1);
}

#[tokio::test]
async fn candidates_without_audio_never_persist() {
    let db = pool().await;
    single_query(&db, "hindi hits", &[]).await;

    let primary = ScriptedProvider::new(
        "primary",
        ProviderScript::Results(vec![track_without_audio("jio_1", "Song", "Artist")]),
    );
    let coord = coordinator(&db, primary, 50);

    match coord.run_once(TriggeredBy::Manual).await {
        RunOutcome::Ok { added, skipped, .. } => {
            assert_eq!(added, 0);
            assert_eq!(skipped, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(catalog::read_counter(&db, "total_tracks").await.unwrap(), 0);
}

#[tokio::test]
async fn dataset_stage_status_flows_into_run_state() {
    let db = pool().await;
    single_query(&db, "hindi hits", &[]).await;

    let primary = ScriptedProvider::new("primary", ProviderScript::Empty);
    let coord = coordinator(&db, primary, 50);

    match coord.run_once(TriggeredBy::Manual).await {
        RunOutcome::Ok { dataset, .. } => {
            assert_eq!(dataset.status, BatchStatus::MissingPath);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let state = runs::load_scheduler_state(&db).await.unwrap();
    assert!(!state.running);
    assert_eq!(state.last_run_by.as_deref(), Some("manual"));
    assert_eq!(state.dataset_status.as_deref(), Some("missing_path"));
    assert!(state.last_run_completed_at.is_some());

    let records = runs::recent_runs(&db, 10).await.unwrap();
    assert_eq!(records[0].dataset_status.as_deref(), Some("missing_path"));
}

#[tokio::test]
async fn init_skips_the_startup_run_when_disabled() {
    let db = pool().await;
    runs::set_scheduler_enabled(&db, false).await.unwrap();

    let primary = ScriptedProvider::new("primary", ProviderScript::Empty);
    let coord = coordinator(&db, primary, 50);

    coord.init().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(runs::recent_runs(&db, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn init_runs_once_at_startup_when_enabled() {
    let db = pool().await;
    single_query(&db, "hindi hits", &[]).await;

    let primary = ScriptedProvider::new("primary", ProviderScript::Empty);
    let coord = coordinator(&db, primary.clone(), 50);

    coord.init().await.unwrap();

    // Startup run is spawned in the background; give it a moment
    for _ in 0..50 {
        if !runs::recent_runs(&db, 10).await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let records = runs::recent_runs(&db, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].triggered_by, "auto");

    coord.stop().await;
}

#[tokio::test]
async fn set_enabled_round_trips_through_persistence() {
    let db = pool().await;
    let primary = ScriptedProvider::new("primary", ProviderScript::Empty);
    let coord = coordinator(&db, primary, 50);

    coord.set_enabled(false).await.unwrap();
    assert!(!runs::load_scheduler_state(&db).await.unwrap().enabled);

    coord.set_enabled(true).await.unwrap();
    assert!(runs::load_scheduler_state(&db).await.unwrap().enabled);

    coord.stop().await;
}
