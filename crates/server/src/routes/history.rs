//! Conversation transcript storage.
//!
//! Transcripts live under `conversation:<id>` in the same store as scraped
//! pages, with the same TTL and validation-on-read.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use webchat_core::cache::CacheWrite;
use webchat_core::cache::keys::conversation_key;
use webchat_core::{Conversation, Error};

use crate::app::AppState;
use crate::error::ApiError;

/// Request body for `POST /api/history`.
#[derive(Debug, Deserialize)]
pub struct SaveHistory {
    pub id: String,
    pub messages: Conversation,
}

pub async fn save_history(
    State(state): State<AppState>, Json(body): Json<SaveHistory>,
) -> Result<Json<&'static str>, ApiError> {
    if body.id.trim().is_empty() {
        return Err(Error::InvalidInput("id cannot be empty".into()).into());
    }

    let key = conversation_key(&body.id);
    match state.conversations.set(&key, &body.messages, state.conversation_ttl_secs).await? {
        CacheWrite::Stored => tracing::info!(id = %body.id, messages = body.messages.0.len(), "conversation saved"),
        CacheWrite::SkippedOversize(len) => tracing::warn!(id = %body.id, len, "conversation too large to store"),
    }

    Ok(Json("OK"))
}

pub async fn get_conversation(
    State(state): State<AppState>, Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    tracing::debug!(id = %id, "loading conversation");
    state
        .conversations
        .get::<Conversation>(&conversation_key(&id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))
}
