//! Application configuration with layered loading.
//!
//! Configuration is assembled with figment from, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if WEBCHAT_CONFIG_FILE set)
//! 3. Environment variables (WEBCHAT_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

use crate::cache::{DEFAULT_MAX_CACHE_BYTES, DEFAULT_TTL_SECS};

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    ///
    /// Set via WEBCHAT_BIND_ADDR.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to the SQLite key-value store.
    ///
    /// Set via WEBCHAT_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for static fetches and the headless browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per static request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Static fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether the headless-browser fallback is enabled.
    ///
    /// Set via WEBCHAT_RENDER_ENABLED.
    #[serde(default = "default_true")]
    pub render_enabled: bool,

    /// Time allowed for rendered navigation to settle, in milliseconds.
    #[serde(default = "default_render_navigation_timeout_ms")]
    pub render_navigation_timeout_ms: u64,

    /// Time allowed for the rendered page body to appear, in milliseconds.
    #[serde(default = "default_render_body_timeout_ms")]
    pub render_body_timeout_ms: u64,

    /// TTL for scraped content and conversation transcripts.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Serialized payloads larger than this are not cached.
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: usize,

    /// Requests admitted per client per window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    /// Sliding window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// API key for the completion service.
    ///
    /// Set via WEBCHAT_COMPLETION_API_KEY. Required only when chat is used.
    #[serde(default)]
    pub completion_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion API.
    #[serde(default = "default_completion_base_url")]
    pub completion_base_url: String,

    /// Model name sent with every completion request.
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./webchat-cache.sqlite")
}

fn default_user_agent() -> String {
    "webchat/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_render_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_render_body_timeout_ms() -> u64 {
    90_000
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_max_cache_bytes() -> usize {
    DEFAULT_MAX_CACHE_BYTES
}

fn default_rate_limit_requests() -> u32 {
    5
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}

fn default_completion_model() -> String {
    "llama3-8b-8192".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            render_enabled: true,
            render_navigation_timeout_ms: default_render_navigation_timeout_ms(),
            render_body_timeout_ms: default_render_body_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_cache_bytes: default_max_cache_bytes(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            completion_api_key: None,
            completion_base_url: default_completion_base_url(),
            completion_model: default_completion_model(),
        }
    }
}

impl AppConfig {
    /// Static fetch timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn render_navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.render_navigation_timeout_ms)
    }

    pub fn render_body_timeout(&self) -> Duration {
        Duration::from_millis(self.render_body_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WEBCHAT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WEBCHAT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Completion API key, for deferred validation when chat is first used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_completion_api_key(&self) -> Result<&str, ConfigError> {
        self.completion_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "completion_api_key".into(),
            hint: "Set WEBCHAT_COMPLETION_API_KEY environment variable".into(),
        })
    }
}
