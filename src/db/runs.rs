//! Run history and scheduler state persistence

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One ingestion run, manual or unattended
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub triggered_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub added: i64,
    pub skipped: i64,
    pub dataset_status: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn start(triggered_by: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            triggered_by: triggered_by.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            added: 0,
            skipped: 0,
            dataset_status: None,
            error: None,
        }
    }
}

/// Persist a newly started run
pub async fn start_run(pool: &SqlitePool, record: &RunRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO run_records (run_id, triggered_by, started_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(record.run_id.to_string())
    .bind(&record.triggered_by)
    .bind(record.started_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a run's terminal state
pub async fn complete_run(
    pool: &SqlitePool,
    run_id: Uuid,
    added: i64,
    skipped: i64,
    dataset_status: Option<&str>,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE run_records SET
            completed_at = ?, added = ?, skipped = ?, dataset_status = ?, error = ?
        WHERE run_id = ?
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(added)
    .bind(skipped)
    .bind(dataset_status)
    .bind(error)
    .bind(run_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent runs, newest first
pub async fn recent_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<RunRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM run_records ORDER BY started_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let run_id: String = row.get("run_id");
        let started_at: String = row.get("started_at");
        let completed_at: Option<String> = row.get("completed_at");
        records.push(RunRecord {
            run_id: Uuid::parse_str(&run_id).unwrap_or_default(),
            triggered_by: row.get("triggered_by"),
            started_at: DateTime::parse_from_rfc3339(&started_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            completed_at: completed_at
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
            added: row.get("added"),
            skipped: row.get("skipped"),
            dataset_status: row.get("dataset_status"),
            error: row.get("error"),
        });
    }
    Ok(records)
}

/// Scheduler state snapshot as persisted
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerState {
    pub enabled: bool,
    pub running: bool,
    pub last_run_started_at: Option<String>,
    pub last_run_completed_at: Option<String>,
    pub last_run_by: Option<String>,
    pub last_added: i64,
    pub last_skipped: i64,
    pub last_error: Option<String>,
    pub dataset_status: Option<String>,
    pub dataset_added: i64,
    pub dataset_skipped: i64,
}

pub async fn load_scheduler_state(pool: &SqlitePool) -> Result<SchedulerState> {
    let row = sqlx::query("SELECT * FROM scheduler_state WHERE id = 1")
        .fetch_one(pool)
        .await?;

    Ok(SchedulerState {
        enabled: row.get::<i64, _>("enabled") != 0,
        running: row.get::<i64, _>("running") != 0,
        last_run_started_at: row.get("last_run_started_at"),
        last_run_completed_at: row.get("last_run_completed_at"),
        last_run_by: row.get("last_run_by"),
        last_added: row.get("last_added"),
        last_skipped: row.get("last_skipped"),
        last_error: row.get("last_error"),
        dataset_status: row.get("dataset_status"),
        dataset_added: row.get("dataset_added"),
        dataset_skipped: row.get("dataset_skipped"),
    })
}

pub async fn set_scheduler_enabled(pool: &SqlitePool, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE scheduler_state SET enabled = ? WHERE id = 1")
        .bind(enabled)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark the persisted scheduler state as running
pub async fn mark_run_started(pool: &SqlitePool, triggered_by: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scheduler_state SET
            running = 1, last_run_started_at = ?, last_run_by = ?
        WHERE id = 1
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(triggered_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a run's aggregated counts on the scheduler state
#[allow(clippy::too_many_arguments)]
pub async fn mark_run_completed(
    pool: &SqlitePool,
    added: i64,
    skipped: i64,
    error: Option<&str>,
    dataset_status: Option<&str>,
    dataset_added: i64,
    dataset_skipped: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scheduler_state SET
            running = 0, last_run_completed_at = ?,
            last_added = ?, last_skipped = ?, last_error = ?,
            dataset_status = ?, dataset_added = ?, dataset_skipped = ?
        WHERE id = 1
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(added)
    .bind(skipped)
    .bind(error)
    .bind(dataset_status)
    .bind(dataset_added)
    .bind(dataset_skipped)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear the running flag without touching counters (error exit path)
pub async fn clear_running(pool: &SqlitePool, error: Option<&str>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scheduler_state SET
            running = 0, last_run_completed_at = ?, last_error = ?
        WHERE id = 1
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn run_record_lifecycle() {
        let pool = memory_pool().await.unwrap();
        let record = RunRecord::start("manual");
        start_run(&pool, &record).await.unwrap();

        complete_run(&pool, record.run_id, 4, 2, Some("ok"), None)
            .await
            .unwrap();

        let runs = recent_runs(&pool, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].added, 4);
        assert_eq!(runs[0].skipped, 2);
        assert_eq!(runs[0].dataset_status.as_deref(), Some("ok"));
        assert!(runs[0].completed_at.is_some());
        assert!(runs[0].error.is_none());
    }

    #[tokio::test]
    async fn scheduler_state_round_trip() {
        let pool = memory_pool().await.unwrap();

        let state = load_scheduler_state(&pool).await.unwrap();
        assert!(state.enabled);
        assert!(!state.running);

        mark_run_started(&pool, "auto").await.unwrap();
        let state = load_scheduler_state(&pool).await.unwrap();
        assert!(state.running);
        assert_eq!(state.last_run_by.as_deref(), Some("auto"));

        mark_run_completed(&pool, 5, 1, None, Some("ok"), 2, 3)
            .await
            .unwrap();
        let state = load_scheduler_state(&pool).await.unwrap();
        assert!(!state.running);
        assert_eq!(state.last_added, 5);
        assert_eq!(state.dataset_added, 2);

        set_scheduler_enabled(&pool, false).await.unwrap();
        let state = load_scheduler_state(&pool).await.unwrap();
        assert!(!state.enabled);
    }
}
