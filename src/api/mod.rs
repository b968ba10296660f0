//! Control surface routes
//!
//! Thin wrappers over the pipeline: status reads, manual run and import
//! triggers, and query configuration. No pipeline logic lives here.

use crate::db::{catalog, cursor, runs, settings};
use crate::error::{ApiError, ApiResult};
use crate::services::TriggeredBy;
use crate::types::SearchQuery;
use crate::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/songs", get(recent_songs))
        .route("/api/categories", get(categories))
        .route("/api/queries", get(get_queries).post(set_queries))
        .route("/api/runs", get(recent_runs))
        .route("/api/dataset/import", post(dataset_import))
        .route("/api/dataset/resume", post(dataset_resume))
        .route("/api/scheduler/run", post(scheduler_run))
        .route("/api/scheduler/start", post(scheduler_start))
        .route("/api/scheduler/stop", post(scheduler_stop))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.startup_time).num_seconds();
    Json(json!({ "status": "ok", "uptime_seconds": uptime }))
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let scheduler = runs::load_scheduler_state(&state.db).await.map_err(ApiError::Ingest)?;
    let dataset = cursor::load(&state.db).await.map_err(ApiError::Ingest)?;
    let total_tracks = catalog::read_counter(&state.db, "total_tracks")
        .await
        .map_err(ApiError::Ingest)?;
    let last_added_at = catalog::read_counter(&state.db, "last_track_added_at")
        .await
        .map_err(ApiError::Ingest)?;
    let uptime = (Utc::now() - state.startup_time).num_seconds();

    Ok(Json(json!({
        "stats": {
            "total_tracks": total_tracks,
            "last_track_added_at": last_added_at,
        },
        "scheduler": scheduler,
        "dataset": dataset,
        "runtime": state.coordinator.state(),
        "uptime_seconds": uptime,
    })))
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

async fn recent_songs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    let songs = catalog::recent(&state.db, limit).await.map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "songs": songs })))
}

async fn categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories = catalog::categories(&state.db).await.map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "categories": categories })))
}

async fn get_queries(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let queries = settings::get_queries(&state.db)
        .await
        .map_err(ApiError::Ingest)?
        .unwrap_or_default();
    Ok(Json(json!({ "queries": queries })))
}

#[derive(Debug, Deserialize)]
struct QueriesBody {
    #[serde(default)]
    queries: Vec<SearchQuery>,
}

async fn set_queries(
    State(state): State<AppState>,
    Json(body): Json<QueriesBody>,
) -> ApiResult<Json<Value>> {
    settings::set_queries(&state.db, &body.queries)
        .await
        .map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "ok": true })))
}

async fn recent_runs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    let runs = runs::recent_runs(&state.db, limit).await.map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "runs": runs })))
}

#[derive(Debug, Default, Deserialize)]
struct ImportBody {
    #[serde(rename = "maxRows")]
    max_rows: Option<usize>,
}

async fn dataset_import(
    State(state): State<AppState>,
    body: Option<Json<ImportBody>>,
) -> ApiResult<Json<Value>> {
    let max_rows = body.and_then(|Json(b)| b.max_rows);
    let outcome = state.importer.import_batch(max_rows).await;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

async fn dataset_resume(
    State(state): State<AppState>,
    body: Option<Json<ImportBody>>,
) -> ApiResult<Json<Value>> {
    cursor::resume_from_last_row(&state.db)
        .await
        .map_err(ApiError::Ingest)?;
    let max_rows = body.and_then(|Json(b)| b.max_rows);
    let outcome = state.importer.import_batch(max_rows).await;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

async fn scheduler_run(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let outcome = state.coordinator.run_once(TriggeredBy::Manual).await;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

async fn scheduler_start(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .coordinator
        .set_enabled(true)
        .await
        .map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "ok": true })))
}

async fn scheduler_stop(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .coordinator
        .set_enabled(false)
        .await
        .map_err(ApiError::Ingest)?;
    Ok(Json(json!({ "ok": true })))
}
