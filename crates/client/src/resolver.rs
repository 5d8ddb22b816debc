//! URL content resolution: cache first, then static fetch, then render.
//!
//! [`ContentResolver::resolve`] never fails. Every fetch, parse and render
//! error ends up in a failure-shaped [`ScrapedContent`].
//!
//! Only static-tier results are written to the cache. Rendered results are
//! returned but not stored.

use std::sync::Arc;

use webchat_core::cache::keys::scraped_key;
use webchat_core::{CacheStore, Error, ScrapedContent, cache::DEFAULT_TTL_SECS};

use crate::extract::extract_html;
use crate::fetch::{PageFetcher, canonicalize};
use crate::render::{RenderOptions, Renderer};

/// Where a tier run ended up.
#[derive(Debug)]
pub enum TierOutcome {
    /// Static fetch and extraction succeeded.
    StaticSuccess(ScrapedContent),
    /// Static tier failed; the render tier should be tried.
    StaticFailure(Error),
    /// Render tier succeeded after a static failure.
    FallbackSuccess(ScrapedContent),
    /// Both tiers failed.
    FallbackFailure { static_error: Error, render_error: Error },
}

impl TierOutcome {
    /// Collapse into the record handed to callers.
    pub fn into_content(self, url: &str) -> ScrapedContent {
        match self {
            Self::StaticSuccess(content) | Self::FallbackSuccess(content) => content,
            Self::StaticFailure(e) => ScrapedContent::failure(url, format!("failed to fetch {url}: {e}")),
            Self::FallbackFailure { static_error, render_error } => ScrapedContent::failure(
                url,
                format!("failed to fetch {url}: {static_error}; render fallback failed: {render_error}"),
            ),
        }
    }
}

/// Cache-aside resolver over two fetch strategies.
pub struct ContentResolver {
    cache: CacheStore,
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn Renderer>>,
    render_opts: RenderOptions,
    ttl_secs: u64,
}

impl ContentResolver {
    /// Resolver with no render fallback and the default 7-day TTL.
    pub fn new(cache: CacheStore, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { cache, fetcher, renderer: None, render_opts: RenderOptions::default(), ttl_secs: DEFAULT_TTL_SECS }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_render_options(mut self, opts: RenderOptions) -> Self {
        self.render_opts = opts;
        self
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render_opts
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Resolve `url` to scraped content.
    pub async fn resolve(&self, url: &str) -> ScrapedContent {
        tracing::info!(url, "resolving URL");
        let key = scraped_key(url);

        match self.cache.get::<ScrapedContent>(&key).await {
            Ok(Some(hit)) => {
                let age_secs = (chrono::Utc::now().timestamp_millis() - hit.created_at) / 1000;
                tracing::info!(url, age_secs, "cache hit");
                return hit;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url, "cache read failed, treating as miss: {e}"),
        }

        let outcome = self.run_tiers(url).await;

        if let TierOutcome::StaticSuccess(content) = &outcome {
            match self.cache.set(&key, content, self.ttl_secs).await {
                Ok(write) => tracing::debug!(url, ?write, "cache write"),
                Err(e) => tracing::warn!(url, "cache write failed: {e}"),
            }
        }

        outcome.into_content(url)
    }

    /// Run the static tier and, if it fails, the render tier.
    pub async fn run_tiers(&self, url: &str) -> TierOutcome {
        match self.static_tier(url).await {
            TierOutcome::StaticFailure(static_error) => {
                tracing::warn!(url, "static fetch failed, escalating to render: {static_error}");
                self.render_tier(url, static_error).await
            }
            outcome => outcome,
        }
    }

    async fn static_tier(&self, url: &str) -> TierOutcome {
        let response = match self.fetcher.fetch(url).await {
            Ok(response) => response,
            Err(e) => return TierOutcome::StaticFailure(e),
        };

        if !response.is_markup() {
            return TierOutcome::StaticFailure(Error::ExtractFailed(format!(
                "unsupported content type: {}",
                response.content_type.as_deref().unwrap_or_default()
            )));
        }

        let page = extract_html(&response.text());
        TierOutcome::StaticSuccess(page.into_scraped(url))
    }

    async fn render_tier(&self, url: &str, static_error: Error) -> TierOutcome {
        let Some(renderer) = &self.renderer else {
            return TierOutcome::FallbackFailure { static_error, render_error: Error::RenderDisabled };
        };

        let target = match canonicalize(url) {
            Ok(target) => target,
            Err(e) => {
                return TierOutcome::FallbackFailure { static_error, render_error: Error::InvalidUrl(e.to_string()) };
            }
        };

        match renderer.render(&target, &self.render_opts).await {
            Ok(page) => TierOutcome::FallbackSuccess(page.into_scraped(url)),
            Err(e) => {
                tracing::warn!(url, "render fallback failed: {e}");
                TierOutcome::FallbackFailure { static_error, render_error: Error::RenderFailed(e.to_string()) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::render::{RenderError, RenderedPage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;
    use webchat_core::cache::{CacheDb, KvBackend, WindowHit};
    use webchat_core::MAX_CONTENT_CHARS;

    const PAGE: &str = "<html><head><title>T</title></head><body><h1>A</h1><p>B</p></body></html>";

    struct FakeFetcher {
        body: Option<&'static str>,
        content_type: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serving(body: &'static str) -> Self {
            Self { body: Some(body), content_type: Some("text/html"), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { body: None, content_type: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = self.body.ok_or_else(|| Error::HttpError("network error: connection refused".into()))?;
            let url = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            Ok(FetchResponse {
                url: url.clone(),
                final_url: url,
                status: StatusCode::OK,
                content_type: self.content_type.map(str::to_string),
                bytes: Bytes::from_static(body.as_bytes()),
                fetch_ms: 1,
            })
        }
    }

    struct FakeRenderer {
        page: Option<RenderedPage>,
        calls: AtomicUsize,
    }

    impl FakeRenderer {
        fn rendering(content: &str) -> Self {
            let page = RenderedPage {
                title: "Rendered".into(),
                meta_description: "m".into(),
                h1: "R1".into(),
                content: content.into(),
                ..Default::default()
            };
            Self { page: Some(page), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { page: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn render(&self, _url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page
                .clone()
                .ok_or(RenderError::Timeout("body", opts.body_timeout.as_millis() as u64))
        }
    }

    async fn cache() -> CacheStore {
        CacheStore::new(Arc::new(CacheDb::open_in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_static_success_is_cached() {
        let cache = cache().await;
        let fetcher = Arc::new(FakeFetcher::serving(PAGE));
        let resolver = ContentResolver::new(cache.clone(), fetcher.clone());

        let first = resolver.resolve("https://example.com").await;
        assert!(first.is_success());
        assert_eq!(first.content.as_deref(), Some("T A B"));

        let cached: Option<ScrapedContent> = cache.get(&scraped_key("https://example.com")).await.unwrap();
        assert_eq!(cached.as_ref(), Some(&first));

        let second = resolver.resolve("https://example.com").await;
        assert_eq!(second.content, first.content);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_both_tiers() {
        let cache = cache().await;
        let seeded = extract_html(PAGE).into_scraped("https://example.com");
        cache.set(&scraped_key("https://example.com"), &seeded, 60).await.unwrap();

        let fetcher = Arc::new(FakeFetcher::failing());
        let renderer = Arc::new(FakeRenderer::failing());
        let resolver = ContentResolver::new(cache, fetcher.clone()).with_renderer(renderer.clone());

        let result = resolver.resolve("https://example.com").await;
        assert_eq!(result, seeded);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_result_not_cached() {
        let cache = cache().await;
        let renderer = Arc::new(FakeRenderer::rendering("from the browser"));
        let resolver =
            ContentResolver::new(cache.clone(), Arc::new(FakeFetcher::failing())).with_renderer(renderer.clone());

        let result = resolver.resolve("https://spa.example.com").await;
        assert!(result.is_success());
        assert_eq!(result.content.as_deref(), Some("from the browser"));
        assert_eq!(result.title.as_deref(), Some("Rendered"));

        let cached: Option<ScrapedContent> = cache.get(&scraped_key("https://spa.example.com")).await.unwrap();
        assert!(cached.is_none());

        resolver.resolve("https://spa.example.com").await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_both_tiers_fail() {
        let resolver = ContentResolver::new(cache().await, Arc::new(FakeFetcher::failing()))
            .with_renderer(Arc::new(FakeRenderer::failing()));

        let result = resolver.resolve("https://down.example.com").await;
        assert!(!result.is_success());
        assert!(result.check_shape().is_ok());

        let message = result.error.unwrap();
        assert!(message.contains("connection refused"));
        assert!(message.contains("render timeout"));
    }

    #[tokio::test]
    async fn test_no_renderer_fails_after_static() {
        let resolver = ContentResolver::new(cache().await, Arc::new(FakeFetcher::failing()));
        let result = resolver.resolve("https://down.example.com").await;
        assert!(result.error.unwrap().contains("RENDER_DISABLED"));
        assert!(result.content.is_none());
    }

    #[tokio::test]
    async fn test_non_markup_escalates() {
        let fetcher = FakeFetcher { content_type: Some("application/pdf"), ..FakeFetcher::serving("%PDF-1.7") };
        let renderer = Arc::new(FakeRenderer::rendering("pdf viewer text"));
        let resolver = ContentResolver::new(cache().await, Arc::new(fetcher)).with_renderer(renderer.clone());

        let outcome = resolver.run_tiers("https://example.com/doc.pdf").await;
        assert!(matches!(outcome, TierOutcome::FallbackSuccess(_)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_refetched() {
        let cache = cache().await;
        let key = scraped_key("https://example.com");
        cache.backend().set_raw(&key, r#"{"legacy":true}"#, 60).await.unwrap();

        let fetcher = Arc::new(FakeFetcher::serving(PAGE));
        let resolver = ContentResolver::new(cache.clone(), fetcher.clone());

        let result = resolver.resolve("https://example.com").await;
        assert!(result.is_success());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let cached: Option<ScrapedContent> = cache.get(&key).await.unwrap();
        assert_eq!(cached, Some(result));
    }

    #[tokio::test]
    async fn test_content_capped_and_shape_valid() {
        let body: &'static str = Box::leak(format!("<p>{}</p>", "word ".repeat(4_000)).into_boxed_str());
        let resolver = ContentResolver::new(cache().await, Arc::new(FakeFetcher::serving(body)));

        let result = resolver.resolve("https://long.example.com").await;
        assert!(result.check_shape().is_ok());
        assert_eq!(result.content.unwrap().chars().count(), MAX_CONTENT_CHARS);
    }

    struct BrokenBackend;

    #[async_trait]
    impl KvBackend for BrokenBackend {
        async fn get_raw(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
        }
        async fn set_raw(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), Error> {
            Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
        }
        async fn delete(&self, _key: &str) -> Result<bool, Error> {
            Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
        }
        async fn record_hit(&self, _k: &str, _l: u32, _w: i64, _n: i64) -> Result<WindowHit, Error> {
            Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
        }
    }

    #[tokio::test]
    async fn test_cache_outage_still_resolves() {
        let resolver =
            ContentResolver::new(CacheStore::new(Arc::new(BrokenBackend)), Arc::new(FakeFetcher::serving(PAGE)));
        let result = resolver.resolve("https://example.com").await;
        assert!(result.is_success());
    }
}
