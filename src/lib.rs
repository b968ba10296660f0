//! firefly-ingest - Music Catalog Ingestion Service
//!
//! Ingests track metadata and playable-asset references from external
//! search providers and from a tabular dataset file, deduplicates them
//! against the catalog, tags them with categories and persists them,
//! on a timer or on demand.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

pub use crate::error::{ApiError, ApiResult, IngestError, ProviderError};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::services::{DatasetImporter, RunCoordinator, SearchAggregator};
use crate::sources::{JamendoClient, JioSaavnClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub coordinator: Arc<RunCoordinator>,
    pub importer: Arc<DatasetImporter>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the pipeline from configuration
    pub fn new(db: SqlitePool, config: &Config) -> error::Result<Self> {
        let primary = Arc::new(JioSaavnClient::new(config.providers.jiosaavn_base.clone())?);
        let secondary = Arc::new(JamendoClient::new(
            config.providers.jamendo_base.clone(),
            config.providers.jamendo_client_id.clone(),
        )?);
        let aggregator = Arc::new(SearchAggregator::new(
            primary,
            secondary,
            config.providers.search_limit,
        ));

        let importer = Arc::new(DatasetImporter::new(
            db.clone(),
            Arc::clone(&aggregator),
            config.dataset.clone(),
        )?);
        let coordinator = Arc::new(RunCoordinator::new(
            db.clone(),
            aggregator,
            Arc::clone(&importer),
            config.run.clone(),
        ));

        Ok(Self {
            db,
            coordinator,
            importer,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    api::routes().with_state(state)
}
