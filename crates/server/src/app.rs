//! Shared state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use webchat_client::{ContentResolver, FetchClient, FetchConfig, RenderOptions};
use webchat_core::{AppConfig, CacheDb, CacheStore, Error, RateLimiter};

use crate::completion::{CompletionClient, OpenAiCompatibleClient};
use crate::middleware::rate_limit;
use crate::routes::{chat, history};

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<ContentResolver>,
    pub conversations: CacheStore,
    pub limiter: RateLimiter,
    pub completion: Arc<dyn CompletionClient>,
    pub conversation_ttl_secs: u64,
}

impl AppState {
    /// Wire the production collaborators around one shared store.
    pub fn from_config(config: &AppConfig, db: Arc<CacheDb>) -> Result<Self, Error> {
        let cache = CacheStore::new(db.clone()).with_max_bytes(config.max_cache_bytes);

        let fetcher = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..FetchConfig::default()
        })?;

        let render_opts = RenderOptions {
            navigation_timeout: config.render_navigation_timeout(),
            body_timeout: config.render_body_timeout(),
            user_agent: Some(config.user_agent.clone()),
            ..RenderOptions::default()
        };

        let resolver = ContentResolver::new(cache.clone(), Arc::new(fetcher))
            .with_ttl(config.cache_ttl_secs)
            .with_render_options(render_opts);
        let resolver = with_renderer(resolver, config.render_enabled);

        let limiter = RateLimiter::new(db, config.rate_limit_requests, config.rate_limit_window());
        let completion = Arc::new(OpenAiCompatibleClient::from_config(config)?);

        Ok(Self {
            resolver: Arc::new(resolver),
            conversations: cache,
            limiter,
            completion,
            conversation_ttl_secs: config.cache_ttl_secs,
        })
    }
}

#[cfg(feature = "render")]
fn with_renderer(resolver: ContentResolver, enabled: bool) -> ContentResolver {
    if enabled { resolver.with_renderer(Arc::new(webchat_client::HeadlessRenderer::new())) } else { resolver }
}

#[cfg(not(feature = "render"))]
fn with_renderer(resolver: ContentResolver, enabled: bool) -> ContentResolver {
    if enabled {
        tracing::warn!("render_enabled is set but the binary was built without the render feature");
    }
    resolver
}

/// Build the HTTP surface. The rate limiter runs ahead of every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::handle_chat))
        .route("/api/chat/{id}", get(history::get_conversation))
        .route("/api/history", post(history::save_history))
        .route("/api/conversation/{id}", get(history::get_conversation))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
