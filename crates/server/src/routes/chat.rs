//! `POST /api/chat`: answer a message, grounding it in a linked page when
//! the message contains a URL.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use webchat_client::find_candidate_url;
use webchat_core::{ChatMessage, Error};

use crate::app::AppState;
use crate::error::ApiError;

pub const SYSTEM_PROMPT: &str = "You are an academic expert, you always cite your sources and base your response only on the context that you have been provided";

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Earlier turns, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Split a message into its first URL candidate and the remaining query.
pub fn split_message(message: &str) -> (Option<&str>, String) {
    match find_candidate_url(message) {
        Some(url) => (Some(url), message.replacen(url, "", 1).trim().to_string()),
        None => (None, message.trim().to_string()),
    }
}

/// User prompt embedding scraped page text.
pub fn compose_prompt(query: &str, content: &str) -> String {
    format!(
        "Answer my question \"{query}\" based on the following content and context provided by the list of messages:\n<content>\n{content}\n</content>"
    )
}

pub async fn handle_chat(
    State(state): State<AppState>, Json(request): Json<ChatRequest>,
) -> Result<Json<String>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(Error::InvalidInput("message cannot be empty".into()).into());
    }

    let (url, query) = split_message(&request.message);

    let content = match url {
        Some(url) => {
            let scraped = state.resolver.resolve(url).await;
            if let Some(err) = &scraped.error {
                tracing::warn!(url, "answering without page content: {err}");
            }
            scraped.content.unwrap_or_default()
        }
        None => String::new(),
    };

    let prompt = match (content.is_empty(), query.is_empty()) {
        (false, _) => compose_prompt(&query, &content),
        // Bare URL with no page text: the message itself is all we have.
        (true, true) => request.message.trim().to_string(),
        (true, false) => query,
    };

    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    messages.extend(request.messages);
    messages.push(ChatMessage::user(prompt));

    let reply = state.completion.complete(&messages).await?;
    Ok(Json(reply))
}
