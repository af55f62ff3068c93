//! Chat endpoint.
//!
//! The widget posts each visitor message here and renders the JSON answer.
//! Error bodies are stable strings the widget matches on, so they change
//! only together with the widget.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header::HeaderName};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use anchorchat_core::{ConversationId, SessionId};

use crate::services::{ChatError, ChatTurn};
use crate::state::AppState;

static X_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    /// The visitor's message.
    pub message: Option<String>,
    /// Hostname of the page embedding the widget.
    pub domain: Option<String>,
    /// Client-generated conversation UUID.
    pub conversation_id: Option<String>,
    /// Anonymous visitor session UUID.
    pub session_id: Option<String>,
}

/// Response body for a successful chat turn.
#[derive(Debug, Serialize)]
pub struct ChatApiResponse {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub message: String,
    pub sources: Vec<String>,
}

/// Handle `POST /api/chat`.
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatApiRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_request(&rejection.body_text()),
    };

    let turn = match parse_turn(request) {
        Ok(turn) => turn,
        Err(details) => return invalid_request(&details),
    };

    match state.chat().handle(turn).await {
        Ok(outcome) => {
            let remaining = outcome.rate_limit_remaining;
            let body = Json(ChatApiResponse {
                conversation_id: outcome.conversation_id,
                session_id: outcome.session_id,
                message: outcome.message,
                sources: outcome.sources,
            });
            with_remaining_header(body.into_response(), remaining)
        }
        Err(e) => chat_error_response(&e),
    }
}

fn parse_turn(request: ChatApiRequest) -> Result<ChatTurn, String> {
    let message = request
        .message
        .ok_or_else(|| "message is required".to_string())?;

    let conversation_id = request
        .conversation_id
        .as_deref()
        .map(ConversationId::parse)
        .transpose()
        .map_err(|_| "conversation_id must be a UUID".to_string())?;

    let session_id = request
        .session_id
        .as_deref()
        .map(SessionId::parse)
        .transpose()
        .map_err(|_| "session_id must be a UUID".to_string())?;

    Ok(ChatTurn {
        message,
        domain: request.domain,
        conversation_id,
        session_id,
    })
}

fn invalid_request(details: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Invalid request format",
            "details": details,
        })),
    )
        .into_response()
}

fn chat_error_response(error: &ChatError) -> Response {
    match error {
        ChatError::InvalidRequest(details) => invalid_request(details),
        ChatError::RateLimited => {
            let response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Rate limit exceeded. Please try again later.",
                })),
            )
                .into_response();
            with_remaining_header(response, 0)
        }
        ChatError::Database(_) | ChatError::Model(_) | ChatError::TooManyToolIterations => {
            let event_id = sentry::capture_error(error);
            tracing::error!(
                error = %error,
                sentry_event_id = %event_id,
                "chat request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to process chat message",
                })),
            )
                .into_response()
        }
    }
}

fn with_remaining_header(mut response: Response, remaining: u32) -> Response {
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        response
            .headers_mut()
            .insert(X_RATE_LIMIT_REMAINING.clone(), value);
    }
    response
}
