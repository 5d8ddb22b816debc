//! Page acquisition for webchat.
//!
//! This crate provides the static HTTP fetch, heuristic text extraction,
//! headless rendering fallback, and the cache-aside resolver that ties them
//! together.

pub mod extract;
pub mod fetch;
pub mod render;
pub mod resolver;

pub use extract::{ExtractedPage, extract, extract_html};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, PageFetcher, canonicalize, find_candidate_url};
#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
pub use render::{RenderError, RenderOptions, RenderedPage, Renderer};
pub use resolver::{ContentResolver, TierOutcome};
