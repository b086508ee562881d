//! Persistent key/value cache table

use crate::DbPool;
use folio_core::{AppError, Timestamp};

/// Reads a cached value
pub async fn cache_get(pool: &DbPool, key: &str) -> Result<Option<String>, AppError> {
    sqlx::query_scalar("SELECT value FROM cache_entries WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to read cache entry", e))
}

/// Stores a cached value
pub async fn cache_set(pool: &DbPool, key: &str, value: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO cache_entries (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Timestamp::now().as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::CacheWriteFailed {
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Deletes a cached value; returns whether it existed
pub async fn cache_delete(pool: &DbPool, key: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete cache entry", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes every cached value
pub async fn cache_clear(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM cache_entries")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to clear cache", e))?;

    Ok(result.rows_affected())
}
