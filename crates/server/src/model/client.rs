//! `OpenAI` chat completions client.
//!
//! Non-streaming API access used by the tool-calling loop: the loop needs the
//! complete response (including any tool calls) before it can continue.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::OpenAiConfig;

use super::error::{ApiErrorResponse, ModelError};
use super::types::{ChatMessage, ChatRequest, ChatResponse, Tool};
use super::ModelClient;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Chat completions API client.
#[derive(Clone)]
pub struct OpenAiClient {
    inner: Arc<OpenAiClientInner>,
}

struct OpenAiClientInner {
    client: reqwest::Client,
    model: String,
}

impl OpenAiClient {
    /// Create a new chat completions client.
    ///
    /// # Arguments
    ///
    /// * `config` - `OpenAI` configuration containing API key and model
    ///
    /// # Panics
    ///
    /// Panics if the API key contains invalid header characters.
    #[must_use]
    pub fn new(config: &OpenAiConfig) -> Self {
        let api_key = config.api_key.expose_secret();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .expect("Invalid API key for header"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            inner: Arc::new(OpenAiClientInner {
                client,
                model: config.chat_model.clone(),
            }),
        }
    }

    /// Handle an error status code.
    async fn handle_error_status(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ModelError {
        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return ModelError::RateLimited(retry_after);
        }

        // Check for unauthorized
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return ModelError::Unauthorized("Invalid API key".to_string());
        }

        // Try to parse API error response
        match response.text().await {
            Ok(body) => {
                if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                    ModelError::Api {
                        error_type: api_error.error.error_type,
                        message: api_error.error.message,
                    }
                } else {
                    ModelError::Api {
                        error_type: "unknown".to_string(),
                        message: body,
                    }
                }
            }
            Err(e) => ModelError::Http(e),
        }
    }
}

#[async_trait::async_trait]
impl ModelClient for OpenAiClient {
    /// Send a chat request and get a complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self, messages, tools), fields(model = %self.inner.model))]
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ModelError> {
        let request = ChatRequest {
            model: self.inner.model.clone(),
            messages,
            tools,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        };

        let response = self
            .inner
            .client
            .post(OPENAI_CHAT_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| ModelError::Parse(format!("Failed to parse response: {e}")))
        } else {
            Err(self.handle_error_status(status, response).await)
        }
    }
}
