//! Database operations for conversations and messages.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use anchorchat_core::{ConversationId, MessageId, MessageRole, OrganizationId, SessionId};

use super::RepositoryError;

// =============================================================================
// Models
// =============================================================================

/// A visitor conversation.
///
/// `organization_id` is absent when the widget sent a domain no tenant has
/// claimed; the conversation still persists so the visitor keeps their
/// history.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub organization_id: Option<OrganizationId>,
    /// Anonymous visitor session this conversation belongs to.
    pub session_id: SessionId,
    /// Short title derived from the first user message.
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted conversation message.
///
/// `content` holds plain text for user and assistant turns, and the full
/// tool-call or tool-result payload for tool turns, so a conversation can be
/// replayed into a model request verbatim.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` conversation queries.
#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: uuid::Uuid,
    organization_id: Option<i64>,
    session_id: uuid::Uuid,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: ConversationId::new(row.id),
            organization_id: row.organization_id.map(OrganizationId::new),
            session_id: SessionId::new(row.session_id),
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for `PostgreSQL` message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: uuid::Uuid,
    role: String,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::parse(&row.role).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown message role: {}", row.role))
        })?;
        Ok(Self {
            id: MessageId::new(row.id),
            conversation_id: ConversationId::new(row.conversation_id),
            role,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Conversation persistence, seam for the chat orchestration loop.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation under a client-supplied ID.
    async fn create(
        &self,
        id: ConversationId,
        organization_id: Option<OrganizationId>,
        session_id: SessionId,
    ) -> Result<Conversation, RepositoryError>;

    /// Get a conversation by ID.
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError>;

    /// Append a message to a conversation.
    async fn add_message(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: serde_json::Value,
    ) -> Result<StoredMessage, RepositoryError>;

    /// Get all messages for a conversation, oldest first.
    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;

    /// Set a conversation's title.
    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
    ) -> Result<(), RepositoryError>;
}

// =============================================================================
// Repository
// =============================================================================

/// Postgres-backed [`ConversationStore`].
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStore for ConversationRepository {
    async fn create(
        &self,
        id: ConversationId,
        organization_id: Option<OrganizationId>,
        session_id: SessionId,
    ) -> Result<Conversation, RepositoryError> {
        let row: ConversationRow = sqlx::query_as(
            r"
            INSERT INTO conversation (id, organization_id, session_id)
            VALUES ($1, $2, $3)
            RETURNING id, organization_id, session_id, title, created_at, updated_at
            ",
        )
        .bind(id.as_uuid())
        .bind(organization_id.map(|id| id.as_i64()))
        .bind(session_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r"
            SELECT id, organization_id, session_id, title, created_at, updated_at
            FROM conversation
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn add_message(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: serde_json::Value,
    ) -> Result<StoredMessage, RepositoryError> {
        let row: MessageRow = sqlx::query_as(
            r"
            INSERT INTO message (conversation_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, role, content, created_at
            ",
        )
        .bind(conversation_id.as_uuid())
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        // Conversation ordering in list views follows message activity.
        sqlx::query("UPDATE conversation SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id.as_uuid())
            .execute(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r"
            SELECT id, conversation_id, role, content, created_at
            FROM message
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE conversation
            SET title = $1, updated_at = NOW()
            WHERE id = $2
            ",
        )
        .bind(title)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
