//! Sliding-window admission control.
//!
//! Each client id owns a window of recorded hits in the shared store. A
//! request is admitted when fewer than `limit` hits fall inside the trailing
//! `window`. The prune/count/insert sequence runs as one atomic backend call,
//! so concurrent requests for the same client cannot both take the last slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::Error;
use crate::cache::keys::rate_limit_key;
use crate::cache::kv::KvBackend;

/// Default capacity per window.
pub const DEFAULT_LIMIT: u32 = 5;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix ms at which the oldest hit leaves the window.
    pub reset_at: i64,
}

/// Sliding-window rate limiter over a [`KvBackend`].
#[derive(Clone)]
pub struct RateLimiter {
    backend: Arc<dyn KvBackend>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(backend: Arc<dyn KvBackend>, limit: u32, window: Duration) -> Self {
        Self { backend, limit, window }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record a request for `client_id` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the window cannot be read or updated.
    /// Callers decide how to fail; nothing is admitted implicitly.
    pub async fn admit(&self, client_id: &str) -> Result<RateLimitDecision, Error> {
        self.admit_at(client_id, Utc::now().timestamp_millis()).await
    }

    /// Same as [`admit`](Self::admit) with an explicit clock.
    pub async fn admit_at(&self, client_id: &str, now_ms: i64) -> Result<RateLimitDecision, Error> {
        let window_ms = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        let key = rate_limit_key(client_id);

        let hit = self.backend.record_hit(&key, self.limit, window_ms, now_ms).await?;

        let reset_at = hit.oldest_ms.unwrap_or(now_ms).saturating_add(window_ms);
        let decision = RateLimitDecision {
            success: hit.admitted,
            limit: self.limit,
            remaining: self.limit.saturating_sub(hit.count),
            reset_at,
        };

        if !decision.success {
            tracing::debug!(client_id, reset_at, "rate limit exceeded");
        }

        Ok(decision)
    }
}
