//! Headless browser rendering for pages that resist static fetching.
//!
//! The [`Renderer`] trait is always available; the chromiumoxide-backed
//! [`HeadlessRenderer`] is behind the `render` feature. Each render launches
//! an isolated browser and tears it down before returning.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;
use webchat_core::{Headings, ScrapedContent};

use crate::extract::{clean_text, combine_fields};

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A bounded wait expired.
    #[error("render timeout after {1}ms waiting for {0}")]
    Timeout(&'static str, u64),

    /// In-page extraction script failed.
    #[error("script evaluation failed: {0}")]
    Script(String),
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Bound on navigation settling (default: 30s).
    pub navigation_timeout: Duration,

    /// Bound on waiting for `<body>` after navigation (default: 90s).
    pub body_timeout: Duration,

    /// Viewport dimensions (default: 1080x1024).
    pub viewport: (u32, u32),

    /// User agent override for the page.
    pub user_agent: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            body_timeout: Duration::from_secs(90),
            viewport: (1080, 1024),
            user_agent: None,
        }
    }
}

/// Raw fields read from a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderedPage {
    pub title: String,
    pub meta_description: String,
    pub h1: String,
    pub h2: String,
    pub h3: String,
    /// Article, paragraph and list-item text, space-joined.
    pub content: String,
}

impl RenderedPage {
    /// Clean every field and assemble a success-shaped record.
    pub fn into_scraped(self, url: &str) -> ScrapedContent {
        ScrapedContent::success(
            url,
            clean_text(&self.title),
            Headings { h1: clean_text(&self.h1), h2: clean_text(&self.h2), h3: Some(clean_text(&self.h3)) },
            clean_text(&self.meta_description),
            combine_fields(&[self.content.as_str()]),
        )
    }
}

/// Renderer trait for headless browser page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL and read its text fields.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;
}

/// Whether a page lifecycle event means network activity has settled.
///
/// `networkAlmostIdle` fires once at most two connections remain open for
/// 500ms; `networkIdle` once none do.
pub fn is_network_settled(lifecycle_event: &str) -> bool {
    matches!(lifecycle_event, "networkAlmostIdle" | "networkIdle")
}

/// Runs inside the page. Works on a detached clone so the live DOM is left
/// untouched.
pub const EXTRACT_SCRIPT: &str = r#"(() => {
    const root = document.documentElement.cloneNode(true);
    const noise = ['script', 'style', 'noscript', 'iframe', 'img', 'video', 'audio', 'form', 'button'];
    root.querySelectorAll(noise.join(',')).forEach(el => el.remove());
    const text = sel => Array.from(root.querySelectorAll(sel)).map(el => el.textContent || '').join(' ');
    const meta = Array.from(root.querySelectorAll('meta[name="description"]'))
        .map(el => el.getAttribute('content') || '').join(' ');
    return {
        title: document.title || '',
        metaDescription: meta,
        h1: text('h1'),
        h2: text('h2'),
        h3: text('h3'),
        content: [text('article'), text('p'), text('li')].join(' '),
    };
})()"#;

#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;

#[cfg(feature = "render")]
mod headless {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
    use futures_util::StreamExt;
    use std::time::Instant;
    use tempfile::TempDir;
    use tokio::task::JoinHandle;

    const BODY_POLL_INTERVAL: Duration = Duration::from_millis(500);

    fn millis(d: Duration) -> u64 {
        d.as_millis() as u64
    }

    /// Fresh, empty browser profile directory. Removed when dropped.
    pub(super) fn profile_dir() -> Result<TempDir, RenderError> {
        tempfile::Builder::new()
            .prefix("webchat-render-")
            .tempdir()
            .map_err(|e| RenderError::BrowserLaunch(format!("failed to create profile dir: {e}")))
    }

    /// One launched browser plus its CDP event pump and private profile.
    ///
    /// `close` is the normal exit. If the session is dropped without it (panic
    /// or cancellation), the handler task is aborted here and chromiumoxide
    /// kills the child process when `Browser` drops. The profile directory is
    /// dropped last.
    struct BrowserSession {
        browser: Browser,
        handler: JoinHandle<()>,
        _profile: TempDir,
    }

    impl BrowserSession {
        async fn launch(opts: &RenderOptions) -> Result<Self, RenderError> {
            let profile = profile_dir()?;
            let (width, height) = opts.viewport;
            let config = BrowserConfig::builder()
                .window_size(width, height)
                .user_data_dir(profile.path())
                .build()
                .map_err(RenderError::BrowserLaunch)?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::debug!("browser handler event error: {e}");
                        break;
                    }
                }
            });

            Ok(Self { browser, handler, _profile: profile })
        }

        async fn extract(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            if let Some(ua) = &opts.user_agent {
                page.set_user_agent(SetUserAgentOverrideParams::new(ua.clone()))
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?;
            }

            page.execute(SetLifecycleEventsEnabledParams::new(true))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            let mut lifecycle = page
                .event_listener::<EventLifecycleEvent>()
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            let navigation = async {
                let navigated = page
                    .execute(NavigateParams::new(url.as_str()))
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?
                    .result;
                if let Some(err) = navigated.error_text {
                    return Err(RenderError::Navigation(err));
                }

                while let Some(event) = lifecycle.next().await {
                    let same_load = navigated.loader_id.as_ref().is_none_or(|id| *id == event.loader_id);
                    if same_load && is_network_settled(&event.name) {
                        return Ok(());
                    }
                }
                Err(RenderError::Navigation("lifecycle event stream closed".into()))
            };
            tokio::time::timeout(opts.navigation_timeout, navigation)
                .await
                .map_err(|_| RenderError::Timeout("network idle", millis(opts.navigation_timeout)))??;

            tokio::time::timeout(opts.body_timeout, async {
                while page.find_element("body").await.is_err() {
                    tokio::time::sleep(BODY_POLL_INTERVAL).await;
                }
            })
            .await
            .map_err(|_| RenderError::Timeout("body", millis(opts.body_timeout)))?;

            let params = EvaluateParams::builder()
                .expression(EXTRACT_SCRIPT)
                .return_by_value(true)
                .await_promise(true)
                .build()
                .map_err(RenderError::Script)?;

            page.evaluate_expression(params)
                .await
                .map_err(|e| RenderError::Script(e.to_string()))?
                .into_value::<RenderedPage>()
                .map_err(|e| RenderError::Script(e.to_string()))
        }

        async fn close(mut self) {
            if let Err(e) = self.browser.close().await {
                tracing::debug!("browser close failed: {e}");
            }
            if let Err(e) = self.browser.wait().await {
                tracing::debug!("browser wait failed: {e}");
            }
        }
    }

    impl Drop for BrowserSession {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    /// Headless Chrome/Chromium renderer using chromiumoxide.
    ///
    /// Stateless: every call launches and closes its own browser.
    #[derive(Debug, Default, Clone)]
    pub struct HeadlessRenderer;

    impl HeadlessRenderer {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait::async_trait]
    impl Renderer for HeadlessRenderer {
        async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
            let start = Instant::now();
            let session = BrowserSession::launch(opts).await?;
            let result = session.extract(url, opts).await;
            session.close().await;

            tracing::debug!(
                url = %url,
                ok = result.is_ok(),
                render_ms = start.elapsed().as_millis() as u64,
                "rendered page"
            );
            result
        }
    }
}
