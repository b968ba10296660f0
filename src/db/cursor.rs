//! Dataset cursor persistence
//!
//! The cursor is a singleton row recording the resumable import position:
//! next unread row offset, total row count with the file fingerprint it
//! was computed against, the last scanned row snapshot, and the counters
//! of the most recent batch. The offset only ever moves forward.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Snapshot of the last scanned dataset row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub index: i64,
    pub track_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
}

/// Persisted resumable dataset position
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetCursor {
    pub offset: i64,
    pub total_rows: Option<i64>,
    pub file_size: Option<i64>,
    pub file_mtime_ms: Option<i64>,
    pub last_row_index: Option<i64>,
    pub last_row: Option<RowSnapshot>,
    pub running: bool,
    pub processed: i64,
    pub added: i64,
    pub skipped: i64,
    pub failed: i64,
    pub last_error: Option<String>,
    pub download_status: Option<String>,
}

impl DatasetCursor {
    /// True when the recorded total must be recomputed for this file
    pub fn needs_row_count(&self, file_size: i64, file_mtime_ms: i64) -> bool {
        self.total_rows.is_none()
            || self.file_size != Some(file_size)
            || self.file_mtime_ms != Some(file_mtime_ms)
    }
}

/// Load the cursor (default state when never written)
pub async fn load(pool: &SqlitePool) -> Result<DatasetCursor> {
    let row = sqlx::query("SELECT * FROM dataset_cursor WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(DatasetCursor::default());
    };

    let last_row_json: Option<String> = row.get("last_row");
    Ok(DatasetCursor {
        offset: row.get("row_offset"),
        total_rows: row.get("total_rows"),
        file_size: row.get("file_size"),
        file_mtime_ms: row.get("file_mtime_ms"),
        last_row_index: row.get("last_row_index"),
        last_row: last_row_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
        running: row.get::<i64, _>("running") != 0,
        processed: row.get("processed"),
        added: row.get("added"),
        skipped: row.get("skipped"),
        failed: row.get("failed"),
        last_error: row.get("last_error"),
        download_status: row.get("download_status"),
    })
}

/// Record a freshly computed row count together with the file fingerprint
pub async fn record_total(
    pool: &SqlitePool,
    total_rows: i64,
    file_size: i64,
    file_mtime_ms: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE dataset_cursor SET
            total_rows = ?, file_size = ?, file_mtime_ms = ?,
            total_rows_updated_at = ?
        WHERE id = 1
        "#,
    )
    .bind(total_rows)
    .bind(file_size)
    .bind(file_mtime_ms)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a batch as started
pub async fn mark_running(
    pool: &SqlitePool,
    path: &str,
    download_status: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE dataset_cursor SET
            running = 1, path = ?, download_status = ?, heartbeat_at = ?
        WHERE id = 1
        "#,
    )
    .bind(path)
    .bind(download_status)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mid-batch checkpoint: advance offset and record the last-row snapshot
pub async fn checkpoint(pool: &SqlitePool, offset: i64, last_row: &RowSnapshot) -> Result<()> {
    let snapshot = serde_json::to_string(last_row).unwrap_or_default();
    sqlx::query(
        r#"
        UPDATE dataset_cursor SET
            row_offset = ?, last_row_index = ?, last_row = ?, heartbeat_at = ?
        WHERE id = 1
        "#,
    )
    .bind(offset)
    .bind(last_row.index)
    .bind(snapshot)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal batch state
#[derive(Debug, Clone, Default)]
pub struct BatchFinish {
    pub offset: i64,
    pub processed: i64,
    pub added: i64,
    pub skipped: i64,
    pub failed: i64,
    pub last_row: Option<RowSnapshot>,
    pub error: Option<String>,
}

/// Final cursor write after a batch: clears running, lands the offset,
/// counters, last-row snapshot and error (or null)
pub async fn finish(pool: &SqlitePool, state: &BatchFinish) -> Result<()> {
    let snapshot = state
        .last_row
        .as_ref()
        .map(|row| serde_json::to_string(row).unwrap_or_default());
    sqlx::query(
        r#"
        UPDATE dataset_cursor SET
            running = 0,
            row_offset = ?,
            processed = ?, added = ?, skipped = ?, failed = ?,
            last_row_index = COALESCE(?, last_row_index),
            last_row = COALESCE(?, last_row),
            last_error = ?,
            last_run_at = ?
        WHERE id = 1
        "#,
    )
    .bind(state.offset)
    .bind(state.processed)
    .bind(state.added)
    .bind(state.skipped)
    .bind(state.failed)
    .bind(state.last_row.as_ref().map(|row| row.index))
    .bind(snapshot)
    .bind(&state.error)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a terminal source error without touching the offset
pub async fn record_source_error(pool: &SqlitePool, message: &str) -> Result<()> {
    sqlx::query("UPDATE dataset_cursor SET running = 0, last_error = ? WHERE id = 1")
        .bind(message)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bump the offset past the last scanned row (crash recovery affordance)
///
/// Only ever moves forward; returns the effective offset.
pub async fn resume_from_last_row(pool: &SqlitePool) -> Result<i64> {
    let cursor = load(pool).await?;
    let target = match cursor.last_row_index {
        Some(last_index) => cursor.offset.max(last_index + 1),
        None => cursor.offset,
    };
    if target != cursor.offset {
        sqlx::query("UPDATE dataset_cursor SET row_offset = ? WHERE id = 1")
            .bind(target)
            .execute(pool)
            .await?;
    }
    Ok(target)
}
