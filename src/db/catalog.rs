//! Catalog persistence
//!
//! Composite-id keyed track rows plus category membership and counters.
//! `exists` precedes every write; a given composite id is written at most
//! once.

use crate::error::{IngestError, Result};
use crate::types::{AudioFeatures, DatasetOrigin, TrackCandidate};
use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Category with member count
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub id: String,
    pub count: i64,
}

/// True when a catalog entry exists for this composite id
pub async fn exists(pool: &SqlitePool, composite_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM catalog_tracks WHERE id = ?")
        .bind(composite_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Persist one catalog entry with its category tags
///
/// Track row, per-category membership rows, category counters and global
/// stats move in a single transaction.
pub async fn save_track(
    pool: &SqlitePool,
    track: &TrackCandidate,
    categories: &[String],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let features_json = track
        .features
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| IngestError::Persist {
            id: track.id.clone(),
            message: format!("features encode: {e}"),
        })?;
    let categories_json =
        serde_json::to_string(categories).map_err(|e| IngestError::Persist {
            id: track.id.clone(),
            message: format!("categories encode: {e}"),
        })?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO catalog_tracks (
            id, source, source_id, name, artist, album, language, genre,
            track_type, tags, duration, audio_url, image_url, popularity,
            explicit, features, dataset_track_id, dataset_source,
            categories, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&track.id)
    .bind(&track.source)
    .bind(&track.source_id)
    .bind(if track.name.is_empty() { "Unknown" } else { &track.name })
    .bind(if track.artist.is_empty() { "Unknown Artist" } else { &track.artist })
    .bind(&track.album)
    .bind(&track.language)
    .bind(&track.genre)
    .bind(&track.track_type)
    .bind(&track.tags)
    .bind(track.duration)
    .bind(&track.audio_url)
    .bind(&track.image_url)
    .bind(track.popularity)
    .bind(track.explicit)
    .bind(features_json)
    .bind(track.dataset.as_ref().map(|d| d.track_id.as_str()))
    .bind(track.dataset.as_ref().map(|d| d.source.as_str()))
    .bind(categories_json)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for category in categories {
        sqlx::query(
            "INSERT OR IGNORE INTO track_categories (category, track_id) VALUES (?, ?)",
        )
        .bind(category)
        .bind(&track.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO category_counts (category, count) VALUES (?, 1)
            ON CONFLICT(category) DO UPDATE SET count = count + 1
            "#,
        )
        .bind(category)
        .execute(&mut *tx)
        .await?;
    }

    increment_counter_tx(&mut tx, "total_tracks", 1).await?;
    sqlx::query(
        r#"
        INSERT INTO stats (key, value) VALUES ('last_track_added_at', ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(Utc::now().timestamp_millis())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(id = %track.id, source = %track.source, "Catalog entry persisted");

    Ok(())
}

async fn increment_counter_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    key: &str,
    by: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stats (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = value + excluded.value
        "#,
    )
    .bind(key)
    .bind(by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Read a stats counter (0 when absent)
pub async fn read_counter(pool: &SqlitePool, key: &str) -> Result<i64> {
    let row = sqlx::query("SELECT value FROM stats WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get::<i64, _>("value")).unwrap_or(0))
}

fn track_from_row(row: &sqlx::sqlite::SqliteRow) -> TrackCandidate {
    let features: Option<String> = row.get("features");
    let dataset_track_id: Option<String> = row.get("dataset_track_id");
    let dataset_source: Option<String> = row.get("dataset_source");

    TrackCandidate {
        id: row.get("id"),
        source: row.get("source"),
        source_id: row.get("source_id"),
        name: row.get("name"),
        artist: row.get("artist"),
        album: row.get("album"),
        language: row.get("language"),
        genre: row.get("genre"),
        track_type: row.get("track_type"),
        tags: row.get("tags"),
        duration: row.get("duration"),
        audio_url: row.get("audio_url"),
        image_url: row.get("image_url"),
        popularity: row.get("popularity"),
        explicit: row.get("explicit"),
        features: features
            .as_deref()
            .and_then(|json| serde_json::from_str::<AudioFeatures>(json).ok()),
        dataset: dataset_track_id.map(|track_id| DatasetOrigin {
            track_id,
            source: dataset_source.unwrap_or_default(),
        }),
    }
}

/// Most recently added entries, returned in ascending creation order
pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<TrackCandidate>> {
    let rows = sqlx::query(
        "SELECT * FROM catalog_tracks ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut tracks: Vec<TrackCandidate> = rows.iter().map(track_from_row).collect();
    tracks.reverse();
    Ok(tracks)
}

/// All categories with counts, largest first
pub async fn categories(pool: &SqlitePool) -> Result<Vec<CategoryCount>> {
    let rows = sqlx::query(
        "SELECT category, count FROM category_counts ORDER BY count DESC, category ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| CategoryCount {
            id: row.get("category"),
            count: row.get("count"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn sample_track(id: &str) -> TrackCandidate {
        TrackCandidate {
            id: id.to_string(),
            source: "jiosaavn".to_string(),
            source_id: id.trim_start_matches("jio_").to_string(),
            name: "Test Track".to_string(),
            artist: "Test Artist".to_string(),
            audio_url: "https://cdn/a.mp4".to_string(),
            features: Some(AudioFeatures {
                tempo: 120.0,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn exists_precedes_write() {
        let pool = memory_pool().await.unwrap();
        assert!(!exists(&pool, "jio_1").await.unwrap());

        save_track(&pool, &sample_track("jio_1"), &["genre_pop".to_string()])
            .await
            .unwrap();

        assert!(exists(&pool, "jio_1").await.unwrap());
        assert_eq!(read_counter(&pool, "total_tracks").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn category_counts_accumulate() {
        let pool = memory_pool().await.unwrap();
        save_track(&pool, &sample_track("jio_1"), &["genre_pop".to_string()])
            .await
            .unwrap();
        save_track(
            &pool,
            &sample_track("jio_2"),
            &["genre_pop".to_string(), "indian_hindi".to_string()],
        )
        .await
        .unwrap();

        let cats = categories(&pool).await.unwrap();
        assert_eq!(cats[0].id, "genre_pop");
        assert_eq!(cats[0].count, 2);
        assert_eq!(cats[1].id, "indian_hindi");
        assert_eq!(cats[1].count, 1);
    }

    #[tokio::test]
    async fn recent_is_ascending_after_reversal() {
        let pool = memory_pool().await.unwrap();
        for i in 1..=3 {
            save_track(&pool, &sample_track(&format!("jio_{i}")), &[])
                .await
                .unwrap();
        }

        let tracks = recent(&pool, 2).await.unwrap();
        assert_eq!(tracks.len(), 2);
        // Newest two, oldest of them first
        assert_eq!(tracks[0].id, "jio_2");
        assert_eq!(tracks[1].id, "jio_3");
    }

    #[tokio::test]
    async fn round_trips_features_json() {
        let pool = memory_pool().await.unwrap();
        save_track(&pool, &sample_track("jio_1"), &[]).await.unwrap();
        let tracks = recent(&pool, 1).await.unwrap();
        assert_eq!(tracks[0].features.as_ref().unwrap().tempo, 120.0);
    }
}
