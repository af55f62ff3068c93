//! In-memory test doubles for exercising routes without Postgres or OpenAI.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use secrecy::SecretString;

use anchorchat_core::{
    ConversationId, MessageId, MessageRole, OrganizationId, SessionId, TenantDomain,
};
use anchorchat_server::commerce::{
    CommerceProvider, CommerceResolver, OrderLineItem, OrderSummary, Product, ProviderError,
    ProviderKind,
};
use anchorchat_server::config::{OpenAiConfig, RateLimitConfig, ServerConfig};
use anchorchat_server::db::{
    Conversation, ConversationStore, RepositoryError, StoredMessage, TenantConfig, TenantStore,
};
use anchorchat_server::model::{
    ChatMessage, ChatResponse, Choice, FinishReason, FunctionCall, ModelClient, ModelError, Tool,
    ToolCall,
};
use anchorchat_server::search::{ContentHit, SearchError, SemanticIndex};
use anchorchat_server::services::{ChatService, RateLimitService};
use anchorchat_server::state::AppState;

// =============================================================================
// Conversation Store
// =============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
    messages: Mutex<Vec<StoredMessage>>,
    next_id: Mutex<i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored messages for assertions.
    pub fn all_messages(&self) -> Vec<StoredMessage> {
        self.messages.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryStore {
    async fn create(
        &self,
        id: ConversationId,
        organization_id: Option<OrganizationId>,
        session_id: SessionId,
    ) -> Result<Conversation, RepositoryError> {
        let conversation = Conversation {
            id,
            organization_id,
            session_id,
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.conversations
            .lock()
            .expect("lock")
            .insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversations.lock().expect("lock").get(&id).cloned())
    }

    async fn add_message(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: serde_json::Value,
    ) -> Result<StoredMessage, RepositoryError> {
        let mut next_id = self.next_id.lock().expect("lock");
        *next_id += 1;
        let message = StoredMessage {
            id: MessageId::new(*next_id),
            conversation_id,
            role,
            content,
            created_at: Utc::now(),
        };
        self.messages.lock().expect("lock").push(message.clone());
        Ok(message)
    }

    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .expect("lock")
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().expect("lock");
        let conversation = conversations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        conversation.title = Some(title.to_string());
        Ok(())
    }
}

// =============================================================================
// Tenant Store
// =============================================================================

pub struct StubTenantStore {
    tenant: Option<TenantConfig>,
}

impl StubTenantStore {
    pub fn with_tenant(tenant: TenantConfig) -> Self {
        Self {
            tenant: Some(tenant),
        }
    }

    pub fn empty() -> Self {
        Self { tenant: None }
    }
}

#[async_trait::async_trait]
impl TenantStore for StubTenantStore {
    async fn get_by_domain(
        &self,
        domain: &TenantDomain,
    ) -> Result<Option<TenantConfig>, RepositoryError> {
        Ok(self
            .tenant
            .as_ref()
            .filter(|t| &t.domain == domain)
            .cloned())
    }
}

// =============================================================================
// Model Client
// =============================================================================

/// Model double that replays a scripted sequence of responses.
pub struct ScriptedModel {
    responses: Mutex<Vec<Result<ChatResponse, ModelError>>>,
    /// Requests seen, for asserting on tools offered and history sent.
    pub requests: Mutex<Vec<(Vec<ChatMessage>, Option<Vec<Tool>>)>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ChatResponse, ModelError>>) -> Self {
        let mut responses = responses;
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ModelError> {
        self.requests.lock().expect("lock").push((messages, tools));
        self.responses
            .lock()
            .expect("lock")
            .pop()
            .unwrap_or_else(|| {
                Err(ModelError::EmptyResponse(
                    "scripted model exhausted".to_string(),
                ))
            })
    }
}

/// A response where the model answers with plain text.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        id: "chatcmpl-test".to_string(),
        model: "gpt-4o-mini".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::text("assistant", text),
            finish_reason: Some(FinishReason::Stop),
        }],
        usage: None,
    }
}

/// A response where the model requests a single tool call.
pub fn tool_call_response(call_id: &str, name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        id: "chatcmpl-test".to_string(),
        model: "gpt-4o-mini".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant_tool_calls(vec![ToolCall {
                id: call_id.to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }]),
            finish_reason: Some(FinishReason::ToolCalls),
        }],
        usage: None,
    }
}

// =============================================================================
// Commerce
// =============================================================================

#[derive(Default)]
pub struct StubProvider {
    pub products: Vec<Product>,
    pub order: Option<OrderSummary>,
    pub fail: bool,
}

impl StubProvider {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl CommerceProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WooCommerce
    }

    async fn search_products(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<Product>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                body: "store unavailable".to_string(),
            });
        }
        Ok(self.products.clone())
    }

    async fn lookup_order(
        &self,
        _reference: &str,
        _email: Option<&str>,
    ) -> Result<Option<OrderSummary>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                body: "store unavailable".to_string(),
            });
        }
        Ok(self.order.clone())
    }
}

pub struct StubResolver {
    provider: Option<Arc<dyn CommerceProvider>>,
}

impl StubResolver {
    pub fn with_provider(provider: Arc<dyn CommerceProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn none() -> Self {
        Self { provider: None }
    }
}

#[async_trait::async_trait]
impl CommerceResolver for StubResolver {
    async fn resolve(&self, _config: &TenantConfig) -> Option<Arc<dyn CommerceProvider>> {
        self.provider.clone()
    }
}

// =============================================================================
// Semantic Index
// =============================================================================

#[derive(Default)]
pub struct StubIndex {
    pub hits: Vec<ContentHit>,
}

impl StubIndex {
    pub fn with_hits(hits: Vec<ContentHit>) -> Self {
        Self { hits }
    }
}

#[async_trait::async_trait]
impl SemanticIndex for StubIndex {
    async fn search(
        &self,
        _organization_id: OrganizationId,
        _domain: &TenantDomain,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError> {
        Ok(self.hits.clone())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: "127.0.0.1".parse::<IpAddr>().expect("valid addr"),
        port: 0,
        openai: OpenAiConfig {
            api_key: SecretString::from("sk-test"),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        },
        rate_limit: RateLimitConfig {
            per_minute: 60,
            burst: 10,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

pub fn tenant(domain: &str) -> TenantConfig {
    TenantConfig {
        organization_id: OrganizationId::new(1),
        domain: TenantDomain::parse(domain).expect("valid domain"),
        commerce_provider: Some("woocommerce".to_string()),
        commerce_config: Some(serde_json::json!({
            "store_url": "https://shop.example.com",
            "consumer_key": "ck_test",
            "consumer_secret": "cs_test"
        })),
        rate_limit_per_minute: None,
        system_prompt: None,
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub model: Arc<ScriptedModel>,
}

/// Build a router wired with the given doubles.
pub fn build_router(
    tenants: StubTenantStore,
    model: ScriptedModel,
    resolver: StubResolver,
    index: StubIndex,
    rate_limit: RateLimitService,
) -> (axum::Router, TestApp) {
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(model);

    let chat = Arc::new(ChatService::new(
        store.clone(),
        Arc::new(tenants),
        model.clone(),
        Arc::new(resolver),
        Arc::new(index),
        Arc::new(rate_limit),
    ));

    let state = AppState::new(test_config(), chat, store.clone());
    let router = anchorchat_server::routes::router(state);

    (router, TestApp { store, model })
}

pub fn sample_product() -> Product {
    Product {
        id: "42".to_string(),
        name: "Trail Runner 2".to_string(),
        url: Some("https://shop.example.com/product/trail-runner-2".to_string()),
        price: Some("89.00".to_string()),
        currency: Some("EUR".to_string()),
        stock_status: Some("instock".to_string()),
        description: Some("Lightweight trail shoe.".to_string()),
    }
}

pub fn sample_order() -> OrderSummary {
    OrderSummary {
        reference: "1001".to_string(),
        status: "processing".to_string(),
        total: Some("89.00".to_string()),
        currency: Some("EUR".to_string()),
        line_items: vec![OrderLineItem {
            name: "Trail Runner 2".to_string(),
            quantity: 1,
        }],
    }
}

pub fn sample_hit(url: &str) -> ContentHit {
    ContentHit {
        url: url.to_string(),
        title: Some("Shipping policy".to_string()),
        snippet: "Orders ship within 2 business days.".to_string(),
        similarity: 0.82,
    }
}
