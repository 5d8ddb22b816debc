//! Key-value operations over the shared store.
//!
//! [`KvBackend`] is the seam the cache store and the rate limiter depend on.
//! [`CacheDb`] implements it on SQLite: plain get/set-with-TTL/delete plus one
//! atomic sliding-window counter.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

/// Outcome of one [`KvBackend::record_hit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Whether the hit was recorded (window had capacity).
    pub admitted: bool,
    /// Hits inside the window after this call.
    pub count: u32,
    /// Timestamp (ms) of the oldest hit still inside the window.
    pub oldest_ms: Option<i64>,
}

/// Storage operations shared by the cache store and the rate limiter.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch a live (unexpired) value.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store a value that expires after `ttl_secs`.
    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), Error>;

    /// Remove a key. Returns whether a row was deleted.
    async fn delete(&self, key: &str) -> Result<bool, Error>;

    /// Atomically prune hits older than `window_ms`, then record a hit at
    /// `now_ms` only if fewer than `limit` remain.
    async fn record_hit(&self, key: &str, limit: u32, window_ms: i64, now_ms: i64) -> Result<WindowHit, Error>;
}

#[async_trait]
impl KvBackend for CacheDb {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                    params![key, now],
                    |row| row.get(0),
                );

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let stored_at = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = stored_at.saturating_add(ttl_ms);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_entries (key, value, stored_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at,
                        expires_at = excluded.expires_at",
                    params![key, value, stored_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn record_hit(&self, key: &str, limit: u32, window_ms: i64, now_ms: i64) -> Result<WindowHit, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<WindowHit, Error> {
                // IMMEDIATE takes the write lock up front so no other process
                // can interleave between the count and the insert.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                tx.execute(
                    "DELETE FROM rate_limit_events WHERE key = ?1 AND at_ms <= ?2",
                    params![key, now_ms - window_ms],
                )?;

                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM rate_limit_events WHERE key = ?1", params![key], |row| {
                        row.get(0)
                    })?;

                let admitted = count < i64::from(limit);
                if admitted {
                    tx.execute("INSERT INTO rate_limit_events (key, at_ms) VALUES (?1, ?2)", params![key, now_ms])?;
                }

                let oldest_ms: Option<i64> =
                    tx.query_row("SELECT MIN(at_ms) FROM rate_limit_events WHERE key = ?1", params![key], |row| {
                        row.get(0)
                    })?;

                tx.commit()?;

                let count = count + i64::from(admitted);
                Ok(WindowHit { admitted, count: u32::try_from(count).unwrap_or(u32::MAX), oldest_ms })
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Delete expired key-value rows.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM kv_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete rate-limit hits recorded at or before `cutoff_ms`, across all keys.
    ///
    /// Keys that stop receiving traffic are never pruned by `record_hit`.
    pub async fn purge_rate_events_before(&self, cutoff_ms: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM rate_limit_events WHERE at_ms <= ?1", params![cutoff_ms])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_raw("k", "v1", 60).await.unwrap();
        assert_eq!(db.get_raw("k").await.unwrap().as_deref(), Some("v1"));

        db.set_raw("k", "v2", 60).await.unwrap();
        assert_eq!(db.get_raw("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_raw("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_raw("short", "v", 1).await.unwrap();
        db.set_raw("long", "v", 3600).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(db.get_raw("short").await.unwrap().is_none());
        assert!(db.get_raw("long").await.unwrap().is_some());

        let purged = db.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_raw("k", "v", 60).await.unwrap();
        assert!(db.delete("k").await.unwrap());
        assert!(!db.delete("k").await.unwrap());
        assert!(db.get_raw("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_hit_caps_window() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = 1_000_000;

        for i in 1..=3 {
            let hit = db.record_hit("ip", 3, 60_000, now + i).await.unwrap();
            assert!(hit.admitted);
            assert_eq!(hit.count, i as u32);
            assert_eq!(hit.oldest_ms, Some(now + 1));
        }

        let hit = db.record_hit("ip", 3, 60_000, now + 10).await.unwrap();
        assert!(!hit.admitted);
        assert_eq!(hit.count, 3);
    }

    #[tokio::test]
    async fn test_record_hit_slides() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_hit("ip", 1, 1_000, 0).await.unwrap();
        assert!(!db.record_hit("ip", 1, 1_000, 999).await.unwrap().admitted);
        assert!(db.record_hit("ip", 1, 1_000, 1_000).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_purge_rate_events() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_hit("a", 5, 60_000, 100).await.unwrap();
        db.record_hit("b", 5, 60_000, 200).await.unwrap();
        db.record_hit("b", 5, 60_000, 300).await.unwrap();

        assert_eq!(db.purge_rate_events_before(200).await.unwrap(), 2);
    }
}
