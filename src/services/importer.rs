//! Resumable dataset-driven batch import
//!
//! Streams the tabular dataset from its start, skips rows below the
//! persisted cursor offset, and drives each row through query building,
//! provider search, fuzzy matching, dedup, classification and
//! persistence. The cursor offset advances by rows *scanned*, not rows
//! matched, so datasets with many misses still make forward progress.
//! A checkpoint lands every N processed rows, bounding loss on crash.

use crate::config::DatasetConfig;
use crate::db::{catalog, cursor};
use crate::error::{IngestError, Result};
use crate::services::aggregator::SearchAggregator;
use crate::services::{categorizer, matcher};
use crate::types::DatasetTrackDescriptor;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of the source-availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Downloaded,
    MissingPath,
    MissingFile,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Downloaded => "downloaded",
            SourceStatus::MissingPath => "missing_path",
            SourceStatus::MissingFile => "missing_file",
        }
    }
}

/// Terminal status of one import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ok,
    MissingPath,
    MissingFile,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Ok => "ok",
            BatchStatus::MissingPath => "missing_path",
            BatchStatus::MissingFile => "missing_file",
            BatchStatus::Error => "error",
        }
    }
}

/// Aggregated result of one `import_batch` call
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub processed: i64,
    pub added: i64,
    pub skipped: i64,
    pub failed: i64,
    pub offset: i64,
    pub error: Option<String>,
}

impl BatchOutcome {
    fn terminal(status: BatchStatus, offset: i64, error: Option<String>) -> Self {
        Self {
            status,
            processed: 0,
            added: 0,
            skipped: 0,
            failed: 0,
            offset,
            error,
        }
    }
}

enum RowOutcome {
    Added,
    Skipped,
    Failed(String),
}

struct RowWindow {
    rows: Vec<(i64, HashMap<String, String>)>,
    read_error: Option<String>,
}

/// Read up to `take` rows starting at row index `skip`
///
/// Rows before `skip` are scanned but discarded; the stream is header
/// driven and tolerant of inconsistent column counts. A mid-stream parse
/// error ends the window without discarding rows already read.
fn read_window(path: &Path, skip: i64, take: usize) -> RowWindow {
    let mut window = RowWindow {
        rows: Vec::new(),
        read_error: None,
    };

    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(error) => {
            window.read_error = Some(error.to_string());
            return window;
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(error) => {
            window.read_error = Some(error.to_string());
            return window;
        }
    };

    let mut index: i64 = -1;
    for record in reader.records() {
        match record {
            Ok(record) => {
                index += 1;
                if index < skip {
                    continue;
                }
                if window.rows.len() >= take {
                    break;
                }
                let mut row = HashMap::with_capacity(headers.len());
                for (i, header) in headers.iter().enumerate() {
                    row.insert(header.to_string(), record.get(i).unwrap_or("").to_string());
                }
                window.rows.push((index, row));
            }
            Err(error) => {
                window.read_error = Some(error.to_string());
                break;
            }
        }
    }

    window
}

/// Count dataset rows in one full streaming pass
///
/// Counts raw records so undecodable row content does not block the
/// count; decoding problems surface when the row itself is imported.
fn count_rows(path: &Path) -> std::result::Result<i64, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let mut total: i64 = 0;
    for record in reader.byte_records() {
        record.map_err(|e| e.to_string())?;
        total += 1;
    }
    Ok(total)
}

fn snapshot_row(index: i64, descriptor: &DatasetTrackDescriptor) -> cursor::RowSnapshot {
    cursor::RowSnapshot {
        index,
        track_id: descriptor.dataset_id.clone(),
        name: descriptor.name.clone(),
        artist: descriptor.artist.clone(),
        album: descriptor.album.clone(),
        genre: descriptor.genre.clone(),
    }
}

pub struct DatasetImporter {
    db: SqlitePool,
    aggregator: Arc<SearchAggregator>,
    http: reqwest::Client,
    config: DatasetConfig,
}

impl DatasetImporter {
    pub fn new(
        db: SqlitePool,
        aggregator: Arc<SearchAggregator>,
        config: DatasetConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::sources::USER_AGENT)
            .build()
            .map_err(|e| IngestError::Config(e.to_string()))?;
        Ok(Self {
            db,
            aggregator,
            http,
            config,
        })
    }

    /// Make sure the dataset file is present locally
    ///
    /// Downloads once from the configured URL when the local file is
    /// absent; never re-downloads an existing file.
    pub async fn ensure_source_available(&self) -> Result<SourceStatus> {
        let Some(path) = &self.config.path else {
            return Ok(SourceStatus::MissingPath);
        };
        if tokio::fs::try_exists(path).await? {
            return Ok(SourceStatus::Ok);
        }
        let Some(url) = &self.config.url else {
            return Ok(SourceStatus::MissingFile);
        };

        tracing::info!(url = %url, path = %path.display(), "Downloading dataset");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::DatasetSource(format!("download failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::DatasetSource(format!(
                "download failed ({})",
                status.as_u16()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| IngestError::DatasetSource(format!("download failed: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &body).await?;

        Ok(SourceStatus::Downloaded)
    }

    /// Recompute the persisted row count when the file fingerprint changed
    pub async fn refresh_row_count(&self, path: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(path).await?;
        let file_size = metadata.len() as i64;
        let file_mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let state = cursor::load(&self.db).await?;
        if !state.needs_row_count(file_size, file_mtime_ms) {
            return Ok(());
        }

        let count_path = path.to_path_buf();
        let total = tokio::task::spawn_blocking(move || count_rows(&count_path))
            .await
            .map_err(|e| IngestError::DatasetRead(e.to_string()))?
            .map_err(IngestError::DatasetRead)?;

        cursor::record_total(&self.db, total, file_size, file_mtime_ms).await?;

        tracing::info!(total_rows = total, "Dataset row count refreshed");

        Ok(())
    }

    /// Import one bounded batch of dataset rows
    ///
    /// Scans at most `max_rows` rows past the cursor offset (defaulting
    /// to the configured batch size) and always concludes with a cursor
    /// write: running=false, advanced offset, counters, last-row snapshot
    /// and error or null.
    pub async fn import_batch(&self, max_rows: Option<usize>) -> BatchOutcome {
        let source = match self.ensure_source_available().await {
            Ok(source) => source,
            Err(error) => {
                let message = error.to_string();
                tracing::error!(error = %message, "Dataset source unavailable");
                if let Err(db_error) = cursor::record_source_error(&self.db, &message).await {
                    tracing::warn!(error = %db_error, "Failed to persist dataset source error");
                }
                return BatchOutcome::terminal(BatchStatus::Error, 0, Some(message));
            }
        };

        match source {
            SourceStatus::MissingPath | SourceStatus::MissingFile => {
                let status = if source == SourceStatus::MissingPath {
                    BatchStatus::MissingPath
                } else {
                    BatchStatus::MissingFile
                };
                if let Err(db_error) =
                    cursor::record_source_error(&self.db, status.as_str()).await
                {
                    tracing::warn!(error = %db_error, "Failed to persist dataset source error");
                }
                return BatchOutcome::terminal(status, 0, None);
            }
            SourceStatus::Ok | SourceStatus::Downloaded => {}
        }

        // Path is present whenever the source check passed
        let path: PathBuf = match &self.config.path {
            Some(path) => path.clone(),
            None => return BatchOutcome::terminal(BatchStatus::MissingPath, 0, None),
        };

        if let Err(error) = self.refresh_row_count(&path).await {
            let message = error.to_string();
            if let Err(db_error) = cursor::record_source_error(&self.db, &message).await {
                tracing::warn!(error = %db_error, "Failed to persist row count error");
            }
            return BatchOutcome::terminal(BatchStatus::Error, 0, Some(message));
        }

        let state = match cursor::load(&self.db).await {
            Ok(state) => state,
            Err(error) => {
                return BatchOutcome::terminal(BatchStatus::Error, 0, Some(error.to_string()))
            }
        };
        let offset = state.offset;
        let max_rows = max_rows.unwrap_or(self.config.batch_size);

        if let Err(error) = cursor::mark_running(
            &self.db,
            &path.display().to_string(),
            source.as_str(),
        )
        .await
        {
            tracing::warn!(error = %error, "Failed to mark dataset batch running");
        }

        tracing::info!(offset, max_rows, "Dataset batch started");

        let window_path = path.clone();
        let window = match tokio::task::spawn_blocking(move || {
            read_window(&window_path, offset, max_rows)
        })
        .await
        {
            Ok(window) => window,
            Err(join_error) => RowWindow {
                rows: Vec::new(),
                read_error: Some(join_error.to_string()),
            },
        };

        let mut processed: i64 = 0;
        let mut added: i64 = 0;
        let mut skipped: i64 = 0;
        let mut failed: i64 = 0;
        let mut last_row: Option<cursor::RowSnapshot> = None;
        let mut last_error = window.read_error.clone();

        for (index, raw_row) in window.rows {
            processed += 1;
            let descriptor = DatasetTrackDescriptor::from_row(&raw_row);
            last_row = Some(snapshot_row(index, &descriptor));

            match self.process_row(&descriptor).await {
                RowOutcome::Added => added += 1,
                RowOutcome::Skipped => skipped += 1,
                RowOutcome::Failed(message) => {
                    failed += 1;
                    tracing::warn!(
                        row_index = index,
                        dataset_id = %descriptor.dataset_id,
                        error = %message,
                        "Dataset row failed"
                    );
                    last_error = Some(message);
                }
            }

            if processed % self.config.checkpoint_every as i64 == 0 {
                if let Some(snapshot) = &last_row {
                    if let Err(error) =
                        cursor::checkpoint(&self.db, offset + processed, snapshot).await
                    {
                        tracing::warn!(error = %error, "Checkpoint write failed");
                    }
                }
            }
        }

        let final_offset = offset + processed;
        let finish = cursor::BatchFinish {
            offset: final_offset,
            processed,
            added,
            skipped,
            failed,
            last_row,
            error: last_error.clone(),
        };
        if let Err(error) = cursor::finish(&self.db, &finish).await {
            tracing::error!(error = %error, "Final cursor write failed");
            return BatchOutcome {
                status: BatchStatus::Error,
                processed,
                added,
                skipped,
                failed,
                offset: final_offset,
                error: Some(error.to_string()),
            };
        }

        let status = if window.read_error.is_some() {
            BatchStatus::Error
        } else {
            BatchStatus::Ok
        };

        tracing::info!(
            processed,
            added,
            skipped,
            failed,
            offset = final_offset,
            status = status.as_str(),
            "Dataset batch finished"
        );

        BatchOutcome {
            status,
            processed,
            added,
            skipped,
            failed,
            offset: final_offset,
            error: window.read_error,
        }
    }

    /// Drive one row through search, match, dedup and persist
    ///
    /// Failures are isolated to the row; only the distinction between an
    /// intentional skip and a real failure is reported upward.
    async fn process_row(&self, descriptor: &DatasetTrackDescriptor) -> RowOutcome {
        let query = descriptor.build_query();
        if query.is_empty() {
            return RowOutcome::Skipped;
        }

        let results = self.aggregator.search(&query, false).await;
        let Some(best) = matcher::pick_best(&results, descriptor) else {
            return RowOutcome::Skipped;
        };
        if !best.has_audio() {
            return RowOutcome::Skipped;
        }

        let merged = descriptor.merge_into(best);

        match catalog::exists(&self.db, &merged.id).await {
            Ok(true) => return RowOutcome::Skipped,
            Ok(false) => {}
            Err(error) => return RowOutcome::Failed(error.to_string()),
        }

        let mut extras = Vec::new();
        if !descriptor.genre.is_empty() {
            extras.push(descriptor.genre.clone());
        }
        let categories = categorizer::classify(&merged, &extras);

        match catalog::save_track(&self.db, &merged, &categories).await {
            Ok(()) => RowOutcome::Added,
            Err(error) => RowOutcome::Failed(error.to_string()),
        }
    }
}
