//! Per-client admission control ahead of every route.
//!
//! The client id is the first `X-Forwarded-For` hop, or `127.0.0.1` when the
//! header is absent. It is spoofable; there is no authentication layer.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use webchat_core::RateLimitDecision;

use crate::app::AppState;
use crate::error::ApiError;

/// Path prefixes that bypass the limiter.
pub const EXCLUDED_PREFIXES: &[&str] = &["/static/", "/_image/", "/favicon.ico"];

pub const DEFAULT_CLIENT_ID: &str = "127.0.0.1";

const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

pub fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(DEFAULT_CLIENT_ID)
        .to_string()
}

fn annotate(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT, HeaderValue::from(decision.limit));
    headers.insert(REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RESET, HeaderValue::from(decision.reset_at));
}

/// Admit or reject the request, then annotate the response with the window state.
///
/// A limiter backend failure rejects the request with a 500.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_id(request.headers());
    let decision = match state.limiter.admit(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(client = %client, "rate limiter unavailable: {e}");
            return ApiError::Internal.into_response();
        }
    };

    let mut response = if decision.success {
        next.run(request).await
    } else {
        tracing::info!(client = %client, reset_at = decision.reset_at, "request rejected by rate limiter");
        ApiError::TooManyRequests.into_response()
    };

    annotate(response.headers_mut(), &decision);
    response
}
