//! Conversation history endpoint.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use anchorchat_core::{ConversationId, MessageRole, SessionId};

use crate::state::AppState;

/// Query parameters for `GET /api/conversations/{id}`.
#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub session_id: String,
}

/// A user-visible message in a conversation.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Response body for a conversation lookup.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: ConversationId,
    pub title: Option<String>,
    pub messages: Vec<ApiMessage>,
}

/// Handle `GET /api/conversations/{id}`.
///
/// Requires the visitor's session ID; a mismatched session gets the same
/// 404 as a missing conversation so IDs can't be probed.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Response {
    let Ok(conversation_id) = ConversationId::parse(&id) else {
        return not_found();
    };
    let Ok(session_id) = SessionId::parse(&query.session_id) else {
        return not_found();
    };

    let conversation = match state.store().get(conversation_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(),
        Err(e) => return internal_error(&e),
    };

    if conversation.session_id != session_id {
        return not_found();
    }

    let messages = match state.store().get_messages(conversation_id).await {
        Ok(messages) => messages,
        Err(e) => return internal_error(&e),
    };

    // Tool turns are implementation detail; the widget renders text only.
    let messages: Vec<ApiMessage> = messages
        .into_iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .map(|m| ApiMessage {
            role: m.role,
            content: m
                .content
                .get("text")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
                .to_string(),
            created_at: m.created_at,
        })
        .collect();

    Json(ConversationResponse {
        conversation_id: conversation.id,
        title: conversation.title,
        messages,
    })
    .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Conversation not found" })),
    )
        .into_response()
}

fn internal_error(error: &crate::db::RepositoryError) -> Response {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        error = %error,
        sentry_event_id = %event_id,
        "conversation lookup failed"
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Failed to load conversation" })),
    )
        .into_response()
}
