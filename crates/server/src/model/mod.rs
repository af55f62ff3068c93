//! Model integration for the chat orchestration loop.
//!
//! The loop talks to the model through the [`ModelClient`] trait so tests can
//! script responses without touching the network. The production
//! implementation is [`OpenAiClient`] over the `OpenAI` Chat Completions API
//! with function calling.

mod client;
mod error;
mod types;

pub use client::OpenAiClient;
pub use error::{ApiError, ApiErrorResponse, ModelError};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, FinishReason, FunctionCall, FunctionDef, Tool,
    ToolCall, Usage,
};

/// A chat completions backend.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation (system prompt first) and optional tool
    /// definitions, returning the complete model response.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the request fails or the API rejects it.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ModelError>;
}
