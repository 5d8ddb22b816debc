//! Cache key namespaces.
//!
//! Scraped content and conversation transcripts share one store, separated by
//! key prefix.

/// Prefix for scraped page records.
pub const SCRAPED_PREFIX: &str = "scraped";

/// Prefix for conversation transcripts.
pub const CONVERSATION_PREFIX: &str = "conversation";

/// Prefix for rate-limit windows.
pub const RATE_LIMIT_PREFIX: &str = "ratelimit";

/// Longest URL fragment kept in a scraped-content key, in characters.
pub const MAX_URL_KEY_CHARS: usize = 255;

/// Key for a scraped page: `scraped:<first 255 chars of url>`.
pub fn scraped_key(url: &str) -> String {
    let end = url.char_indices().nth(MAX_URL_KEY_CHARS).map_or(url.len(), |(idx, _)| idx);
    format!("{SCRAPED_PREFIX}:{}", &url[..end])
}

/// Key for a conversation transcript: `conversation:<id>`.
pub fn conversation_key(id: &str) -> String {
    format!("{CONVERSATION_PREFIX}:{id}")
}

/// Key for a client's rate-limit window: `ratelimit:<client id>`.
pub fn rate_limit_key(client_id: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}:{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraped_key_short_url() {
        assert_eq!(scraped_key("https://example.com"), "scraped:https://example.com");
    }

    #[test]
    fn test_scraped_key_truncates() {
        let url = format!("https://example.com/{}", "a".repeat(400));
        let key = scraped_key(&url);
        assert_eq!(key.len(), "scraped:".len() + MAX_URL_KEY_CHARS);
        assert!(key.starts_with("scraped:https://example.com/aaa"));
    }

    #[test]
    fn test_scraped_key_shared_prefix_collides() {
        let base = format!("https://example.com/{}", "a".repeat(300));
        assert_eq!(scraped_key(&format!("{base}?x=1")), scraped_key(&format!("{base}?x=2")));
    }

    #[test]
    fn test_scraped_key_multibyte_boundary() {
        let url = "é".repeat(300);
        let key = scraped_key(&url);
        assert_eq!(key.chars().count(), "scraped:".len() + MAX_URL_KEY_CHARS);
    }

    #[test]
    fn test_namespaces_distinct() {
        assert_eq!(conversation_key("42"), "conversation:42");
        assert_eq!(rate_limit_key("127.0.0.1"), "ratelimit:127.0.0.1");
        assert_ne!(scraped_key("42"), conversation_key("42"));
    }
}
