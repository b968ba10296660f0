//! Key/value settings persistence

use crate::error::Result;
use crate::types::SearchQuery;
use sqlx::{Row, SqlitePool};

const QUERIES_KEY: &str = "queries";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("value")))
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Configured search queries, when any have been stored
pub async fn get_queries(pool: &SqlitePool) -> Result<Option<Vec<SearchQuery>>> {
    let Some(json) = get_setting(pool, QUERIES_KEY).await? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&json).ok())
}

pub async fn set_queries(pool: &SqlitePool, queries: &[SearchQuery]) -> Result<()> {
    let json = serde_json::to_string(queries).unwrap_or_else(|_| "[]".to_string());
    set_setting(pool, QUERIES_KEY, &json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn queries_round_trip() {
        let pool = memory_pool().await.unwrap();
        assert!(get_queries(&pool).await.unwrap().is_none());

        let queries = vec![SearchQuery {
            query: "punjabi hits".to_string(),
            force_desi: true,
            categories: vec!["punjabi".to_string()],
        }];
        set_queries(&pool, &queries).await.unwrap();

        let loaded = get_queries(&pool).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].query, "punjabi hits");
        assert!(loaded[0].force_desi);
    }
}
