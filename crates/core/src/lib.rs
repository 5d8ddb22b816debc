//! Core types and shared functionality for webchat.
//!
//! This crate provides:
//! - Scraped-content and conversation records
//! - Key-value store with SQLite backend and typed, self-healing cache layer
//! - Sliding-window rate limiter
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod content;
pub mod conversation;
pub mod error;
pub mod ratelimit;

pub use cache::{CacheDb, CacheRecord, CacheStore, KvBackend};
pub use config::{AppConfig, ConfigError};
pub use content::{Headings, MAX_CONTENT_CHARS, ScrapedContent};
pub use conversation::{ChatMessage, Conversation, Role};
pub use error::Error;
pub use ratelimit::{RateLimitDecision, RateLimiter};
