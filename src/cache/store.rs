//! SQLite-backed store for historical price responses
//!
//! Provides a `HistoricalStore` that keeps serialized payloads in the
//! `btc_price_cache` table together with the time they were written, so that
//! fetched history survives restarts.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Errors raised by the historical store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize cache payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of reading from the store, including metadata about freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached payload
    pub data: T,
    /// When the payload was written
    pub cached_at: DateTime<Utc>,
    /// Whether the entry is older than the retention window
    pub is_expired: bool,
}

/// Persistent key/value table of historical price payloads
///
/// Each row holds a composite key, the JSON payload and the write time in
/// milliseconds since the epoch. Writes are single-statement upserts, so a
/// reader sees either the previous row or the new one.
#[derive(Debug, Clone)]
pub struct HistoricalStore {
    pool: SqlitePool,
    retention: Duration,
}

impl HistoricalStore {
    /// Opens (creating if needed) the database file at `path`
    pub async fn open(path: &Path, retention: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, retention };
        store.migrate().await?;
        Ok(store)
    }

    /// Opens a private in-memory database
    ///
    /// Limited to one connection, since every SQLite memory connection is a
    /// separate database.
    pub async fn in_memory(retention: Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool, retention };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS btc_price_cache (
                date TEXT PRIMARY KEY NOT NULL,
                price_data TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Writes `data` under `key`, replacing any existing row
    pub async fn write<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        written_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(data)?;

        sqlx::query(
            "INSERT INTO btc_price_cache (date, price_data, timestamp) VALUES (?1, ?2, ?3)
             ON CONFLICT(date) DO UPDATE SET
                price_data = excluded.price_data,
                timestamp = excluded.timestamp",
        )
        .bind(key)
        .bind(json)
        .bind(written_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads the entry stored under `key`
    ///
    /// Returns `Ok(None)` if there is no row, or if the stored payload cannot be
    /// parsed as `T` (logged and treated as a miss). Expired rows are returned
    /// with `is_expired = true`; callers decide whether to use them.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedData<T>>, StoreError> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT price_data, timestamp FROM btc_price_cache WHERE date = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((price_data, timestamp)) = row else {
            return Ok(None);
        };

        let data = match serde_json::from_str::<T>(&price_data) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache row");
                return Ok(None);
            }
        };

        let Some(cached_at) = DateTime::<Utc>::from_timestamp_millis(timestamp) else {
            warn!(key, timestamp, "discarding cache row with invalid timestamp");
            return Ok(None);
        };

        Ok(Some(CachedData {
            data,
            cached_at,
            is_expired: now - cached_at >= self.retention,
        }))
    }

    /// Deletes every entry written more than the retention window before `now`
    ///
    /// Returns the number of rows removed.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = (now - self.retention).timestamp_millis();
        let result = sqlx::query("DELETE FROM btc_price_cache WHERE timestamp < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored entries
    pub async fn len(&self) -> Result<u64, StoreError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM btc_price_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Closes the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
