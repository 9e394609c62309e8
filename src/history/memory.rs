use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Instant;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::{HistoryLimits, HistoryMessage, HistoryStore};
use crate::core::errors::RagError;
use crate::llm::ChatMessage;

struct Session {
    messages: VecDeque<HistoryMessage>,
    last_access: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            last_access: Instant::now(),
        }
    }
}

/// Process-memory history registry kept in least-recently-used order.
pub struct InMemoryHistoryStore {
    limits: HistoryLimits,
    sessions: Mutex<LruCache<String, Session>>,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(HistoryLimits::unbounded())
    }
}

impl InMemoryHistoryStore {
    pub fn new(limits: HistoryLimits) -> Self {
        let cache = match limits.max_sessions {
            Some(max) => LruCache::new(NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN)),
            None => LruCache::unbounded(),
        };

        Self {
            limits,
            sessions: Mutex::new(cache),
        }
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Drops sessions idle for longer than the configured TTL; returns how many.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.purge_locked(&mut sessions)
    }

    fn purge_locked(&self, sessions: &mut LruCache<String, Session>) -> usize {
        let Some(ttl) = self.limits.idle_ttl else {
            return 0;
        };

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.last_access.elapsed() >= ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.pop(id);
        }

        if !expired.is_empty() {
            tracing::debug!("Purged {} idle chat sessions", expired.len());
        }
        expired.len()
    }

    /// Fetches or creates `session_id` and marks it most recently used.
    fn touch<'a>(
        &self,
        sessions: &'a mut LruCache<String, Session>,
        session_id: &str,
    ) -> &'a mut Session {
        self.purge_locked(sessions);

        if !sessions.contains(session_id) && sessions.len() >= sessions.cap().get() {
            if let Some((oldest, _)) = sessions.peek_lru() {
                tracing::debug!("Evicting least recently used session {}", oldest);
            }
        }

        let session = sessions.get_or_insert_mut(session_id.to_string(), Session::new);
        session.last_access = Instant::now();
        session
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn messages(&self, session_id: &str) -> Result<Vec<HistoryMessage>, RagError> {
        let mut sessions = self.sessions.lock().await;
        let session = self.touch(&mut sessions, session_id);
        Ok(session.messages.iter().cloned().collect())
    }

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> Result<(), RagError> {
        let mut sessions = self.sessions.lock().await;
        let max_messages = self.limits.max_messages_per_session;
        let session = self.touch(&mut sessions, session_id);

        session
            .messages
            .extend(messages.into_iter().map(HistoryMessage::from_chat));

        if let Some(max) = max_messages {
            while session.messages.len() > max {
                session.messages.pop_front();
            }
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool, RagError> {
        let mut sessions = self.sessions.lock().await;
        self.purge_locked(&mut sessions);
        Ok(sessions.pop(session_id).is_some())
    }

    async fn sessions(&self) -> Result<Vec<String>, RagError> {
        let mut sessions = self.sessions.lock().await;
        self.purge_locked(&mut sessions);
        let mut ids: Vec<String> = sessions.iter().map(|(id, _)| id.clone()).collect();
        ids.sort();
        Ok(ids)
    }
}
