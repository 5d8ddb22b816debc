//! Scraped page records.
//!
//! A [`ScrapedContent`] is produced by every resolution attempt and takes one
//! of two shapes: success (all content fields set, no error) or failure (all
//! content fields empty, error set).

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::CacheRecord;

/// Upper bound on the combined `content` string, in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Heading text grouped by level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: String,
    pub h2: String,
    /// Only populated by the rendered tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h3: Option<String>,
}

/// Result of one URL resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedContent {
    pub url: String,
    pub title: Option<String>,
    pub headings: Option<Headings>,
    pub meta_description: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
}

impl ScrapedContent {
    /// Build a success-shaped record. `content` is capped at [`MAX_CONTENT_CHARS`].
    pub fn success(
        url: impl Into<String>, title: String, headings: Headings, meta_description: String, content: String,
    ) -> Self {
        Self {
            url: url.into(),
            title: Some(title),
            headings: Some(headings),
            meta_description: Some(meta_description),
            content: Some(truncate_chars(content, MAX_CONTENT_CHARS)),
            error: None,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Build a failure-shaped record carrying a human-readable message.
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            headings: None,
            meta_description: None,
            content: None,
            error: Some(error.into()),
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Content text, or empty when the record is failure-shaped.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Check the success-XOR-failure shape and the content length cap.
    pub fn check_shape(&self) -> Result<(), String> {
        let populated = [
            self.title.is_some(),
            self.headings.is_some(),
            self.meta_description.is_some(),
            self.content.is_some(),
        ];

        match &self.error {
            None if populated.iter().all(|p| *p) => {}
            None => return Err("success shape with missing content fields".into()),
            Some(_) if populated.iter().any(|p| *p) => {
                return Err("failure shape with populated content fields".into());
            }
            Some(_) => {}
        }

        if let Some(content) = &self.content
            && content.chars().count() > MAX_CONTENT_CHARS
        {
            return Err(format!("content exceeds {MAX_CONTENT_CHARS} characters"));
        }

        Ok(())
    }
}

impl CacheRecord for ScrapedContent {
    /// Only success-shaped records are ever written, so anything else under a
    /// scraped-content key is treated as corrupt.
    fn validate(&self) -> Result<(), String> {
        self.check_shape()?;
        if !self.is_success() {
            return Err("failure-shaped record in content cache".into());
        }
        Ok(())
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}
