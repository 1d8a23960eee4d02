/*!
 * SQLite-backed translation cache.
 *
 * Entries survive the process. Writes are upserts, so concurrent writers of
 * one fingerprint resolve to the last one; reads bump a per-entry hit count.
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::translation::cache::{CacheStats, CacheStore};

use super::connection::DatabaseConnection;

/// Durable cache store
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    db: DatabaseConnection,
    /// Lookups that found nothing since this store was opened
    misses: Arc<AtomicU64>,
}

/// Cache table summary
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTableStats {
    /// Stored entries
    pub entries: usize,
    /// Sum of per-entry hit counts
    pub total_hits: u64,
    /// Oldest entry
    pub oldest: Option<DateTime<Utc>>,
    /// Newest entry
    pub newest: Option<DateTime<Utc>>,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for CacheTableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entries: {}, Hits: {}, Size: {} KB",
            self.entries,
            self.total_hits,
            self.file_size_bytes / 1024
        )?;
        if let (Some(oldest), Some(newest)) = (self.oldest, self.newest) {
            write!(
                f,
                ", Oldest: {}, Newest: {}",
                oldest.format("%Y-%m-%d %H:%M:%S"),
                newest.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        Ok(())
    }
}

impl SqliteCacheStore {
    /// Wrap an open connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open or create a cache file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Open the cache in the user data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Cache that lives only as long as this value
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Hit count of one entry
    pub async fn hit_count(&self, key: &str) -> Result<Option<u64>> {
        let key = key.to_string();
        self.db
            .execute_async(move |conn| {
                let hits: Option<i64> = conn
                    .query_row(
                        "SELECT hit_count FROM translation_cache WHERE fingerprint = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(hits.map(|h| h.max(0) as u64))
            })
            .await
    }

    /// Table summary
    pub async fn table_stats(&self) -> Result<CacheTableStats> {
        let file_size_bytes = self.db.file_size();
        self.db
            .execute_async(move |conn| {
                let (entries, total_hits, oldest, newest): (i64, i64, Option<String>, Option<String>) = conn
                    .query_row(
                        "SELECT COUNT(*), COALESCE(SUM(hit_count), 0), MIN(created_at), MAX(created_at) FROM translation_cache",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )?;

                Ok(CacheTableStats {
                    entries: entries.max(0) as usize,
                    total_hits: total_hits.max(0) as u64,
                    oldest: oldest.as_deref().and_then(parse_timestamp),
                    newest: newest.as_deref().and_then(parse_timestamp),
                    file_size_bytes,
                })
            })
            .await
    }

    /// Delete entries created before `cutoff`; returns how many went
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = cutoff.to_rfc3339();
        let deleted = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM translation_cache WHERE created_at < ?1",
                    [&cutoff],
                )?)
            })
            .await?;
        debug!("Pruned {} cache entries", deleted);
        Ok(deleted)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let found = self
            .db
            .execute_async(move |conn| {
                let translation: Option<String> = conn
                    .query_row(
                        "SELECT translation FROM translation_cache WHERE fingerprint = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;

                if translation.is_some() {
                    conn.execute(
                        "UPDATE translation_cache SET hit_count = hit_count + 1 WHERE fingerprint = ?1",
                        [&key],
                    )?;
                }
                Ok(translation)
            })
            .await?;

        if found.is_none() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let created_at = Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_cache (fingerprint, translation, created_at, hit_count)
                    VALUES (?1, ?2, ?3, 0)
                    ON CONFLICT(fingerprint)
                    DO UPDATE SET translation = excluded.translation, created_at = excluded.created_at
                    "#,
                    params![key, value, created_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn len(&self) -> Result<usize> {
        self.db
            .execute_async(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?;
                Ok(count.max(0) as usize)
            })
            .await
    }

    async fn clear(&self) -> Result<()> {
        let deleted = self
            .db
            .execute_async(|conn| Ok(conn.execute("DELETE FROM translation_cache", [])?))
            .await?;
        self.misses.store(0, Ordering::Relaxed);
        debug!("Cleared {} cache entries", deleted);
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let table = self.table_stats().await?;
        Ok(CacheStats {
            entries: table.entries,
            hits: table.total_hits,
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
