//! Chat service orchestrating model conversations for store visitors.
//!
//! This service handles the complete flow of:
//! 1. Validating the incoming message and rate limiting the domain
//! 2. Resolving the tenant and its commerce provider
//! 3. Loading or creating the conversation
//! 4. Calling the model with tools and executing tool calls
//! 5. Persisting every turn and returning the answer with sources

use std::sync::Arc;

use tracing::{info, instrument, warn};

use anchorchat_core::{ConversationId, MessageRole, SessionId, TenantDomain};

use crate::commerce::CommerceResolver;
use crate::db::{ConversationStore, RepositoryError, StoredMessage, TenantConfig, TenantStore};
use crate::model::{ChatMessage, FinishReason, ModelClient, ModelError, ToolCall};
use crate::search::SemanticIndex;
use crate::services::rate_limit::{RateLimitDecision, RateLimitService};
use crate::services::tools::{ToolRouter, available_tools};

/// Maximum number of tool use iterations to prevent infinite loops.
const MAX_TOOL_ITERATIONS: usize = 10;

/// Maximum accepted user message length in characters.
const MAX_MESSAGE_LENGTH: usize = 4_000;

/// Maximum number of source links returned with an answer.
const MAX_SOURCES: usize = 5;

/// Rate limit bucket for requests that carry no domain.
const FALLBACK_DOMAIN: &str = "unknown.invalid";

const SYSTEM_PROMPT: &str = "\
You are a friendly customer support assistant for an online store. \
Answer questions about products, orders, shipping, and store policies. \
Use the available tools to look up live information instead of guessing. \
If a tool fails or returns nothing, say so honestly and suggest contacting \
the store directly. Keep answers short and concrete. Never invent order \
details, prices, or policies.";

/// Errors that can occur in the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request payload failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The domain exceeded its request quota.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// Model API error.
    #[error("model API error: {0}")]
    Model(#[from] ModelError),

    /// Too many tool iterations (possible infinite loop).
    #[error("too many tool iterations")]
    TooManyToolIterations,
}

/// A completed chat turn.
#[derive(Debug)]
pub struct ChatOutcome {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    /// The assistant's answer text.
    pub message: String,
    /// Source URLs cited by the tools used, deduplicated, at most five.
    pub sources: Vec<String>,
    /// Remaining rate limit capacity for the domain.
    pub rate_limit_remaining: u32,
}

/// Incoming chat turn, already JSON-validated at the route layer.
#[derive(Debug)]
pub struct ChatTurn {
    pub message: String,
    pub domain: Option<String>,
    pub conversation_id: Option<ConversationId>,
    pub session_id: Option<SessionId>,
}

/// Chat service orchestrating model conversations.
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    tenants: Arc<dyn TenantStore>,
    model: Arc<dyn ModelClient>,
    commerce: Arc<dyn CommerceResolver>,
    index: Arc<dyn SemanticIndex>,
    rate_limit: Arc<RateLimitService>,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        tenants: Arc<dyn TenantStore>,
        model: Arc<dyn ModelClient>,
        commerce: Arc<dyn CommerceResolver>,
        index: Arc<dyn SemanticIndex>,
        rate_limit: Arc<RateLimitService>,
    ) -> Self {
        Self {
            store,
            tenants,
            model,
            commerce,
            index,
            rate_limit,
        }
    }

    /// Process one visitor message and produce the assistant's answer.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidRequest` for malformed input,
    /// `ChatError::RateLimited` when the domain's quota is exhausted, and
    /// other variants when a downstream dependency fails.
    #[instrument(skip(self, turn), fields(domain = turn.domain.as_deref().unwrap_or("-")))]
    pub async fn handle(&self, turn: ChatTurn) -> Result<ChatOutcome, ChatError> {
        let message = turn.message.trim();
        if message.is_empty() {
            return Err(ChatError::InvalidRequest("message must not be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::InvalidRequest(format!(
                "message exceeds {MAX_MESSAGE_LENGTH} characters"
            )));
        }

        let domain = match turn.domain.as_deref() {
            Some(raw) => Some(
                TenantDomain::parse(raw)
                    .map_err(|e| ChatError::InvalidRequest(format!("invalid domain: {e}")))?,
            ),
            None => None,
        };

        let tenant = match &domain {
            Some(domain) => self.tenants.get_by_domain(domain).await?,
            None => None,
        };

        let remaining = self.enforce_rate_limit(domain.as_ref(), tenant.as_ref())?;

        let session_id = turn.session_id.unwrap_or_else(SessionId::generate);
        let conversation_id = self
            .resolve_conversation(turn.conversation_id, tenant.as_ref(), session_id)
            .await?;

        // Persist the user turn before calling the model, so a model failure
        // doesn't lose what the visitor typed.
        let history_len = self.store.get_messages(conversation_id).await?.len();
        self.store
            .add_message(
                conversation_id,
                MessageRole::User,
                serde_json::json!({ "text": message }),
            )
            .await?;

        if history_len == 0 {
            let title = generate_title(message);
            if let Err(e) = self.store.update_title(conversation_id, &title).await {
                warn!(error = %e, "failed to set conversation title");
            }
        }

        let (answer, sources) = self
            .run_model_loop(conversation_id, tenant.as_ref(), &domain)
            .await?;

        Ok(ChatOutcome {
            conversation_id,
            session_id,
            message: answer,
            sources,
            rate_limit_remaining: remaining,
        })
    }

    fn enforce_rate_limit(
        &self,
        domain: Option<&TenantDomain>,
        tenant: Option<&TenantConfig>,
    ) -> Result<u32, ChatError> {
        let fallback;
        let bucket = match domain {
            Some(domain) => domain,
            None => {
                fallback = TenantDomain::parse(FALLBACK_DOMAIN)
                    .map_err(|e| ChatError::InvalidRequest(e.to_string()))?;
                &fallback
            }
        };

        let override_quota = tenant
            .and_then(|t| t.rate_limit_per_minute)
            .and_then(|n| u32::try_from(n).ok());

        match self.rate_limit.check(bucket, override_quota) {
            RateLimitDecision::Allowed { remaining } => Ok(remaining),
            RateLimitDecision::Denied => Err(ChatError::RateLimited),
        }
    }

    /// Load the conversation, or create it under the client-supplied ID.
    ///
    /// The widget generates conversation IDs client side so it can render
    /// optimistically; an unknown ID is a new conversation, not an error.
    async fn resolve_conversation(
        &self,
        conversation_id: Option<ConversationId>,
        tenant: Option<&TenantConfig>,
        session_id: SessionId,
    ) -> Result<ConversationId, ChatError> {
        let organization_id = tenant.map(|t| t.organization_id);

        match conversation_id {
            Some(id) => match self.store.get(id).await? {
                Some(existing) => {
                    if existing.session_id != session_id {
                        return Err(ChatError::InvalidRequest(
                            "conversation does not belong to this session".into(),
                        ));
                    }
                    Ok(existing.id)
                }
                None => {
                    let created = self.store.create(id, organization_id, session_id).await?;
                    Ok(created.id)
                }
            },
            None => {
                let created = self
                    .store
                    .create(ConversationId::generate(), organization_id, session_id)
                    .await?;
                Ok(created.id)
            }
        }
    }

    /// Run the model tool loop until the model answers with text.
    async fn run_model_loop(
        &self,
        conversation_id: ConversationId,
        tenant: Option<&TenantConfig>,
        domain: &Option<TenantDomain>,
    ) -> Result<(String, Vec<String>), ChatError> {
        let history = self.store.get_messages(conversation_id).await?;
        let mut messages = build_model_messages(&history, tenant);

        // Tools need a tenant: commerce uses its credentials and content
        // search is scoped to its pages.
        let (tools, router) = match (tenant, domain) {
            (Some(tenant), Some(domain)) => {
                let provider = self.commerce.resolve(tenant).await;
                let tools = available_tools(provider.is_some());
                let router = ToolRouter::new(
                    provider,
                    Arc::clone(&self.index),
                    tenant.organization_id,
                    domain.clone(),
                );
                (Some(tools), Some(router))
            }
            _ => (None, None),
        };

        let mut sources: Vec<String> = Vec::new();
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > MAX_TOOL_ITERATIONS {
                warn!("too many tool iterations, stopping");
                return Err(ChatError::TooManyToolIterations);
            }

            let response = self.model.chat(messages.clone(), tools.clone()).await?;

            info!(
                finish_reason = ?response.finish_reason(),
                "model response received"
            );

            let reply = response.message().cloned().ok_or_else(|| {
                ModelError::EmptyResponse("no choices in response".to_string())
            })?;

            let tool_calls = reply.tool_calls.clone().unwrap_or_default();
            let wants_tools =
                !tool_calls.is_empty() && response.finish_reason() == Some(FinishReason::ToolCalls);

            if !wants_tools {
                let answer = reply.content.unwrap_or_default();
                if answer.is_empty() {
                    return Err(ChatError::Model(ModelError::EmptyResponse(
                        "model returned no text".to_string(),
                    )));
                }

                dedup_sources(&mut sources);
                self.store
                    .add_message(
                        conversation_id,
                        MessageRole::Assistant,
                        serde_json::json!({ "text": answer, "sources": sources }),
                    )
                    .await?;

                return Ok((answer, sources));
            }

            let Some(router) = &router else {
                // Tools were never offered; a tool call here is a model bug.
                warn!("model requested tools without a tenant");
                return Err(ChatError::Model(ModelError::Parse(
                    "tool call received but no tools were offered".to_string(),
                )));
            };

            messages.push(ChatMessage::assistant_tool_calls(tool_calls.clone()));

            for call in &tool_calls {
                self.record_tool_call(conversation_id, call).await?;

                let input = call
                    .function
                    .parse_arguments()
                    .unwrap_or(serde_json::Value::Null);
                let outcome = router.execute(&call.function.name, &input).await;

                sources.extend(outcome.sources.iter().cloned());

                self.store
                    .add_message(
                        conversation_id,
                        MessageRole::ToolResult,
                        serde_json::json!({
                            "tool_call_id": call.id,
                            "content": outcome.content,
                            "is_error": outcome.is_error,
                        }),
                    )
                    .await?;

                messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    outcome.content.clone(),
                ));
            }
        }
    }

    async fn record_tool_call(
        &self,
        conversation_id: ConversationId,
        call: &ToolCall,
    ) -> Result<(), ChatError> {
        self.store
            .add_message(
                conversation_id,
                MessageRole::ToolCall,
                serde_json::json!({
                    "id": call.id,
                    "name": call.function.name,
                    "arguments": call.function.arguments,
                }),
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// History Replay
// =============================================================================

/// State for building model messages from stored messages.
///
/// Consecutive tool-call rows collapse into one assistant turn with a
/// `tool_calls` list, matching how the wire format groups them.
struct MessageBuilder {
    result: Vec<ChatMessage>,
    pending_tool_calls: Vec<ToolCall>,
}

impl MessageBuilder {
    const fn new() -> Self {
        Self {
            result: Vec::new(),
            pending_tool_calls: Vec::new(),
        }
    }

    fn flush_tool_calls(&mut self) {
        if !self.pending_tool_calls.is_empty() {
            self.result.push(ChatMessage::assistant_tool_calls(
                std::mem::take(&mut self.pending_tool_calls),
            ));
        }
    }

    fn add_user(&mut self, msg: &StoredMessage) {
        self.flush_tool_calls();
        self.result
            .push(ChatMessage::text("user", get_json_str(&msg.content, "text")));
    }

    fn add_assistant(&mut self, msg: &StoredMessage) {
        self.flush_tool_calls();
        self.result.push(ChatMessage::text(
            "assistant",
            get_json_str(&msg.content, "text"),
        ));
    }

    fn add_tool_call(&mut self, msg: &StoredMessage) {
        self.pending_tool_calls.push(ToolCall {
            id: get_json_str(&msg.content, "id"),
            call_type: "function".to_string(),
            function: crate::model::FunctionCall {
                name: get_json_str(&msg.content, "name"),
                arguments: get_json_str(&msg.content, "arguments"),
            },
        });
    }

    fn add_tool_result(&mut self, msg: &StoredMessage) {
        self.flush_tool_calls();
        self.result.push(ChatMessage::tool_result(
            get_json_str(&msg.content, "tool_call_id"),
            get_json_str(&msg.content, "content"),
        ));
    }

    fn finish(mut self) -> Vec<ChatMessage> {
        self.flush_tool_calls();
        self.result
    }
}

/// Extract a string from JSON content, returning empty string if not found.
fn get_json_str(content: &serde_json::Value, key: &str) -> String {
    content
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Convert stored history to the model wire format, system prompt first.
fn build_model_messages(
    history: &[StoredMessage],
    tenant: Option<&TenantConfig>,
) -> Vec<ChatMessage> {
    let system = match tenant.and_then(|t| t.system_prompt.as_deref()) {
        Some(extra) => format!("{SYSTEM_PROMPT}\n\n{extra}"),
        None => SYSTEM_PROMPT.to_string(),
    };

    let mut builder = MessageBuilder::new();
    for msg in history {
        match msg.role {
            MessageRole::User => builder.add_user(msg),
            MessageRole::Assistant => builder.add_assistant(msg),
            MessageRole::ToolCall => builder.add_tool_call(msg),
            MessageRole::ToolResult => builder.add_tool_result(msg),
        }
    }

    let mut messages = vec![ChatMessage::text("system", system)];
    messages.extend(builder.finish());
    messages
}

/// Deduplicate sources preserving first-seen order, capped at [`MAX_SOURCES`].
fn dedup_sources(sources: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    sources.retain(|s| seen.insert(s.clone()));
    sources.truncate(MAX_SOURCES);
}

/// Generate a conversation title from the first user message.
fn generate_title(message: &str) -> String {
    const MAX_TITLE_LENGTH: usize = 50;

    let trimmed = message.trim();
    if trimmed.len() <= MAX_TITLE_LENGTH {
        trimmed.to_string()
    } else {
        // Back off to a char boundary; byte 50 can land inside a multi-byte
        // character.
        let mut end = MAX_TITLE_LENGTH;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = trimmed.get(..end).unwrap_or(trimmed);
        truncated.rfind(' ').map_or_else(
            || format!("{truncated}..."),
            |space_idx| format!("{}...", truncated.get(..space_idx).unwrap_or(truncated)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorchat_core::{ConversationId, MessageId};
    use chrono::Utc;

    fn stored(role: MessageRole, content: serde_json::Value) -> StoredMessage {
        StoredMessage {
            id: MessageId::new(1),
            conversation_id: ConversationId::generate(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_title_short() {
        let title = generate_title("Where is my order?");
        assert_eq!(title, "Where is my order?");
    }

    #[test]
    fn test_generate_title_long() {
        let message = "This is a very long message that should be truncated because it exceeds the maximum title length";
        let title = generate_title(message);
        assert!(title.len() <= 53); // MAX_TITLE_LENGTH + "..."
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_generate_title_multibyte_at_boundary() {
        // A multi-byte character straddling byte 50 must not panic the slice.
        let message = format!("{}éx", "a".repeat(49));
        let title = generate_title(&message);
        assert!(title.ends_with("..."));
        assert!(title.starts_with("aaa"));
    }

    #[test]
    fn test_generate_title_trims_whitespace() {
        let title = generate_title("  Hello world  ");
        assert_eq!(title, "Hello world");
    }

    #[test]
    fn test_dedup_sources_caps_at_five() {
        let mut sources = vec![
            "https://a.example/1".to_string(),
            "https://a.example/1".to_string(),
            "https://a.example/2".to_string(),
            "https://a.example/3".to_string(),
            "https://a.example/4".to_string(),
            "https://a.example/5".to_string(),
            "https://a.example/6".to_string(),
        ];
        dedup_sources(&mut sources);
        assert_eq!(sources.len(), 5);
        assert_eq!(sources[0], "https://a.example/1");
        assert_eq!(sources[1], "https://a.example/2");
    }

    #[test]
    fn test_build_model_messages_starts_with_system() {
        let history = vec![stored(
            MessageRole::User,
            serde_json::json!({"text": "hi"}),
        )];
        let messages = build_model_messages(&history, None);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_build_model_messages_groups_tool_calls() {
        let history = vec![
            stored(MessageRole::User, serde_json::json!({"text": "shoes?"})),
            stored(
                MessageRole::ToolCall,
                serde_json::json!({
                    "id": "call_1",
                    "name": "search_products",
                    "arguments": "{\"query\":\"shoes\"}"
                }),
            ),
            stored(
                MessageRole::ToolResult,
                serde_json::json!({
                    "tool_call_id": "call_1",
                    "content": "{\"count\":0,\"products\":[]}",
                    "is_error": false
                }),
            ),
            stored(
                MessageRole::Assistant,
                serde_json::json!({"text": "No shoes in stock."}),
            ),
        ];

        let messages = build_model_messages(&history, None);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[2].role, "assistant");
        let calls = messages[2].tool_calls.as_ref().expect("tool calls");
        assert_eq!(calls[0].function.name, "search_products");
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[4].role, "assistant");
    }

    #[test]
    fn test_build_model_messages_appends_tenant_prompt() {
        use anchorchat_core::{OrganizationId, TenantDomain};

        let tenant = TenantConfig {
            organization_id: OrganizationId::from(1),
            domain: TenantDomain::parse("shop.example.com").expect("valid"),
            commerce_provider: None,
            commerce_config: None,
            rate_limit_per_minute: None,
            system_prompt: Some("The store ships only within the EU.".to_string()),
        };

        let messages = build_model_messages(&[], Some(&tenant));
        let system = messages[0].content.as_deref().expect("system text");
        assert!(system.contains("ships only within the EU"));
    }
}
