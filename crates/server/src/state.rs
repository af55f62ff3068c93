//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::ChatService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the chat service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    chat: Arc<ChatService>,
    store: Arc<dyn crate::db::ConversationStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        chat: Arc<ChatService>,
        store: Arc<dyn crate::db::ConversationStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                chat,
                store,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the chat service.
    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }

    /// Get a reference to the conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn crate::db::ConversationStore> {
        &self.inner.store
    }
}
