//! Database access for firefly-ingest
//!
//! One SQLite database holds the catalog, category membership and counts,
//! the dataset cursor, scheduler state and run history.

pub mod catalog;
pub mod cursor;
pub mod runs;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and bootstrap tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_tracks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            source_id TEXT NOT NULL,
            name TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            track_type TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            duration INTEGER NOT NULL DEFAULT 0,
            audio_url TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '',
            popularity INTEGER,
            explicit INTEGER,
            features TEXT,
            dataset_track_id TEXT,
            dataset_source TEXT,
            categories TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_categories (
            category TEXT NOT NULL,
            track_id TEXT NOT NULL,
            PRIMARY KEY (category, track_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_counts (
            category TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stats (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_cursor (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            row_offset INTEGER NOT NULL DEFAULT 0,
            total_rows INTEGER,
            file_size INTEGER,
            file_mtime_ms INTEGER,
            last_row_index INTEGER,
            last_row TEXT,
            running INTEGER NOT NULL DEFAULT 0,
            processed INTEGER NOT NULL DEFAULT 0,
            added INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            download_status TEXT,
            path TEXT,
            heartbeat_at TEXT,
            total_rows_updated_at TEXT,
            last_run_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scheduler_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            enabled INTEGER NOT NULL DEFAULT 1,
            running INTEGER NOT NULL DEFAULT 0,
            last_run_started_at TEXT,
            last_run_completed_at TEXT,
            last_run_by TEXT,
            last_added INTEGER NOT NULL DEFAULT 0,
            last_skipped INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            dataset_status TEXT,
            dataset_added INTEGER NOT NULL DEFAULT 0,
            dataset_skipped INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS run_records (
            run_id TEXT PRIMARY KEY,
            triggered_by TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            added INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            dataset_status TEXT,
            error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Singleton state rows
    sqlx::query("INSERT OR IGNORE INTO dataset_cursor (id) VALUES (1)")
        .execute(pool)
        .await?;
    sqlx::query("INSERT OR IGNORE INTO scheduler_state (id) VALUES (1)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}

/// In-memory pool with bootstrapped tables, for tests
pub async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    init_tables(&pool).await?;
    Ok(pool)
}
