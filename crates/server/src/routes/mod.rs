//! HTTP route handlers.

pub mod chat;
pub mod conversations;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat::handle_chat))
        .route(
            "/api/conversations/{id}",
            get(conversations::get_conversation),
        )
        .with_state(state)
}

/// Liveness check.
async fn health() -> &'static str {
    "ok"
}
