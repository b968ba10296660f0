//! Shared test fixtures: scripted providers and dataset files

#![allow(dead_code)]

use firefly_ingest::config::DatasetConfig;
use firefly_ingest::error::ProviderError;
use firefly_ingest::services::{DatasetImporter, SearchAggregator};
use firefly_ingest::sources::SearchProvider;
use firefly_ingest::types::TrackCandidate;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted provider does on every call
pub enum ProviderScript {
    Results(Vec<TrackCandidate>),
    Empty,
    Fail,
}

/// Provider stub that counts invocations
pub struct ScriptedProvider {
    name: &'static str,
    script: ProviderScript,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, script: ProviderScript) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(name: &'static str, script: ProviderScript, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(
        &self,
        _query: &str,
        _page: u32,
        _limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            ProviderScript::Results(results) => Ok(results.clone()),
            ProviderScript::Empty => Ok(Vec::new()),
            ProviderScript::Fail => Err(ProviderError::Network("scripted failure".to_string())),
        }
    }
}

/// Candidate with a playable asset link
pub fn track(id: &str, name: &str, artist: &str) -> TrackCandidate {
    TrackCandidate {
        id: id.to_string(),
        source: "jiosaavn".to_string(),
        source_id: id.trim_start_matches("jio_").to_string(),
        name: name.to_string(),
        artist: artist.to_string(),
        audio_url: format!("https://cdn.example/{id}.mp4"),
        ..Default::default()
    }
}

/// Candidate without a playable asset link
pub fn track_without_audio(id: &str, name: &str, artist: &str) -> TrackCandidate {
    TrackCandidate {
        audio_url: String::new(),
        ..track(id, name, artist)
    }
}

pub async fn pool() -> SqlitePool {
    firefly_ingest::db::memory_pool()
        .await
        .expect("in-memory pool")
}

pub fn aggregator(
    primary: Arc<ScriptedProvider>,
    secondary: Arc<ScriptedProvider>,
) -> Arc<SearchAggregator> {
    Arc::new(SearchAggregator::new(primary, secondary, 20))
}

/// Write a dataset file with the standard header and the given rows
pub fn write_dataset(rows: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp dataset");
    writeln!(
        file,
        "track_id,track_name,artists,album_name,track_genre,duration_ms,popularity,explicit"
    )
    .expect("write header");
    for row in rows {
        writeln!(file, "{row}").expect("write row");
    }
    file.flush().expect("flush dataset");
    file
}

pub fn dataset_config(path: Option<PathBuf>, batch_size: usize) -> DatasetConfig {
    DatasetConfig {
        path,
        url: None,
        batch_size,
        checkpoint_every: 2,
    }
}

pub fn importer(
    db: SqlitePool,
    aggregator: Arc<SearchAggregator>,
    config: DatasetConfig,
) -> DatasetImporter {
    DatasetImporter::new(db, aggregator, config).expect("importer")
}
