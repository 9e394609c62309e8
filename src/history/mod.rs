//! Per-session chat history.
//!
//! The chain depends only on [`HistoryStore`]; the registry behind it is
//! injected. Two backends ship with the crate:
//! - `InMemoryHistoryStore`: process memory with optional session/message/idle limits
//! - `SqliteHistoryStore`: durable storage through sqlx

mod memory;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::HistoryConfig;
use crate::core::errors::RagError;
use crate::llm::{ChatMessage, ChatRole};

pub use memory::InMemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryMessage {
    pub fn from_chat(message: ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            created_at: Utc::now(),
        }
    }

    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// Bounds applied by a history backend. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Least-recently-used sessions are evicted beyond this count.
    pub max_sessions: Option<usize>,
    /// Only the newest messages of a session are kept.
    pub max_messages_per_session: Option<usize>,
    /// Sessions untouched for this long are dropped.
    pub idle_ttl: Option<Duration>,
}

impl HistoryLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl From<&HistoryConfig> for HistoryLimits {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            max_messages_per_session: config.max_messages_per_session,
            idle_ttl: config.idle_ttl_secs.map(Duration::from_secs),
        }
    }
}

/// Registry mapping a session id to its ordered message history.
///
/// Sessions are created on first access and never share state.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Chronological messages of `session_id`, creating an empty session if needed.
    async fn messages(&self, session_id: &str) -> Result<Vec<HistoryMessage>, RagError>;

    /// Appends `messages` in order as one unit.
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> Result<(), RagError>;

    /// Removes the session; returns whether it existed.
    async fn clear(&self, session_id: &str) -> Result<bool, RagError>;

    /// Known session ids.
    async fn sessions(&self) -> Result<Vec<String>, RagError>;
}
