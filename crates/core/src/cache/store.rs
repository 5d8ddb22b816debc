//! Typed cache-aside store with read-time validation.
//!
//! Reads decode JSON into the caller's record type and run its
//! [`CacheRecord::validate`] check. Anything that fails either step is deleted
//! and reported as a miss. Writes over `max_bytes` are skipped.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::kv::KvBackend;
use crate::Error;

/// Default TTL for scraped content and conversation transcripts (7 days).
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default cap on a serialized payload.
pub const DEFAULT_MAX_CACHE_BYTES: usize = 1_000_000;

/// A value that can live in the cache.
///
/// Field names and primitive types are checked by deserialization; `validate`
/// adds any cross-field rules the type needs.
pub trait CacheRecord: Serialize + DeserializeOwned + Send + Sync {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Outcome of a [`CacheStore::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    /// Serialized size exceeded the cap; nothing was written.
    SkippedOversize(usize),
}

/// Typed get/set/delete over a [`KvBackend`].
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    max_bytes: usize,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend, max_bytes: DEFAULT_MAX_CACHE_BYTES }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Read and validate a record.
    ///
    /// Corrupt or schema-mismatched payloads are deleted and yield `Ok(None)`.
    /// Only backend failures surface as errors.
    pub async fn get<T: CacheRecord>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(raw) = self.backend.get_raw(key).await? else {
            tracing::debug!(key, "cache miss");
            return Ok(None);
        };

        let reason = match serde_json::from_str::<T>(&raw) {
            Ok(value) => match value.validate() {
                Ok(()) => {
                    tracing::debug!(key, "cache hit");
                    return Ok(Some(value));
                }
                Err(reason) => reason,
            },
            Err(e) => e.to_string(),
        };

        tracing::warn!(key, %reason, "invalid cached payload, deleting");
        self.backend.delete(key).await?;
        Ok(None)
    }

    /// Serialize and store a record with the given TTL.
    pub async fn set<T: CacheRecord>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<CacheWrite, Error> {
        let serialized = serde_json::to_string(value)?;

        if serialized.len() > self.max_bytes {
            tracing::warn!(key, size = serialized.len(), max = self.max_bytes, "payload too large to cache");
            return Ok(CacheWrite::SkippedOversize(serialized.len()));
        }

        self.backend.set_raw(key, &serialized, ttl_secs).await?;
        tracing::debug!(key, size = serialized.len(), "cached payload");
        Ok(CacheWrite::Stored)
    }

    /// Unconditionally remove a key.
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        self.backend.delete(key).await?;
        Ok(())
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::cache::keys::{conversation_key, scraped_key};
    use crate::content::{Headings, ScrapedContent};
    use crate::conversation::{ChatMessage, Conversation};

    async fn store() -> CacheStore {
        let db = CacheDb::open_in_memory().await.unwrap();
        CacheStore::new(Arc::new(db))
    }

    fn sample(url: &str) -> ScrapedContent {
        ScrapedContent::success(
            url,
            "Title".into(),
            Headings { h1: "A".into(), h2: "B".into(), h3: None },
            "desc".into(),
            "Title desc A B".into(),
        )
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = store().await;
        let key = scraped_key("https://example.com");
        let value = sample("https://example.com");

        assert_eq!(store.set(&key, &value, DEFAULT_TTL_SECS).await.unwrap(), CacheWrite::Stored);
        let back: ScrapedContent = store.get(&key).await.unwrap().unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_healed() {
        let store = store().await;
        let key = scraped_key("https://example.com");
        store.backend().set_raw(&key, "{not json", 60).await.unwrap();

        let first: Option<ScrapedContent> = store.get(&key).await.unwrap();
        assert!(first.is_none());
        assert!(store.backend().get_raw(&key).await.unwrap().is_none());

        let second: Option<ScrapedContent> = store.get(&key).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_wrong_field_types_are_healed() {
        let store = store().await;
        let key = scraped_key("https://example.com");
        let legacy = r#"{"url":"u","title":42,"headings":null,"metaDescription":null,"content":null,"error":null,"createdAt":1}"#;
        store.backend().set_raw(&key, legacy, 60).await.unwrap();

        let result: Option<ScrapedContent> = store.get(&key).await.unwrap();
        assert!(result.is_none());
        assert!(store.backend().get_raw(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_field_must_be_string_or_null() {
        let store = store().await;
        let key = scraped_key("https://example.com");
        let mut value = serde_json::to_value(sample("u")).unwrap();
        value["error"] = serde_json::json!(false);
        store.backend().set_raw(&key, &value.to_string(), 60).await.unwrap();

        let result: Option<ScrapedContent> = store.get(&key).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_shape_violation_is_healed() {
        let store = store().await;
        let key = scraped_key("https://example.com");
        let failure = ScrapedContent::failure("https://example.com", "boom");
        store
            .backend()
            .set_raw(&key, &serde_json::to_string(&failure).unwrap(), 60)
            .await
            .unwrap();

        let result: Option<ScrapedContent> = store.get(&key).await.unwrap();
        assert!(result.is_none());
        assert!(store.backend().get_raw(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_payload_skipped() {
        let store = store().await;
        let key = conversation_key("big");
        let conv = Conversation(vec![ChatMessage::user("x".repeat(DEFAULT_MAX_CACHE_BYTES + 1))]);

        let write = store.set(&key, &conv, DEFAULT_TTL_SECS).await.unwrap();
        assert!(matches!(write, CacheWrite::SkippedOversize(n) if n > DEFAULT_MAX_CACHE_BYTES));

        let result: Option<Conversation> = store.get(&key).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_custom_max_bytes() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = CacheStore::new(Arc::new(db)).with_max_bytes(10);
        let conv = Conversation(vec![ChatMessage::user("hello there")]);

        let write = store.set("k", &conv, 60).await.unwrap();
        assert!(matches!(write, CacheWrite::SkippedOversize(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        let key = conversation_key("1");
        store.set(&key, &Conversation::default(), 60).await.unwrap();
        store.delete(&key).await.unwrap();

        let result: Option<Conversation> = store.get(&key).await.unwrap();
        assert!(result.is_none());
    }
}
