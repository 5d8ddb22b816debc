//! SQLite-backed key-value store, typed cache layer and key namespaces.
//!
//! - `connection`: opening the store and applying pragmas and migrations
//! - `kv`: the [`KvBackend`] trait and its SQLite implementation, including
//!   the atomic sliding-window primitive
//! - `store`: typed get/set/delete with validation-on-read and a size cap
//! - `keys`: key prefixes for scraped content, conversations and rate limits

pub mod connection;
pub mod keys;
pub mod kv;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use kv::{KvBackend, WindowHit};
pub use store::{CacheRecord, CacheStore, CacheWrite, DEFAULT_MAX_CACHE_BYTES, DEFAULT_TTL_SECS};
