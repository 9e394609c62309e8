use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{HistoryLimits, HistoryMessage, HistoryStore};
use crate::core::errors::RagError;
use crate::llm::{ChatMessage, ChatRole};

/// History persisted in SQLite. Only `max_messages_per_session` is honoured, on read.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db_path: PathBuf,
    pool: SqlitePool,
    limits: HistoryLimits,
}

impl SqliteHistoryStore {
    pub async fn new(db_path: PathBuf, limits: HistoryLimits) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await
            .map_err(|e| RagError::History(format!("Failed to connect to history db: {}", e)))?;

        let store = Self {
            db_path,
            pool,
            limits,
        };
        store.init_db().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_db(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::History(format!("Failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('system', 'user', 'assistant')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::History(format!("Failed to init messages table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session_id_id ON messages(session_id, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::History(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    async fn ensure_session(&self, session_id: &str) -> Result<(), RagError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(RagError::history)?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn messages(&self, session_id: &str) -> Result<Vec<HistoryMessage>, RagError> {
        self.ensure_session(session_id).await?;

        let rows = match self.limits.max_messages_per_session {
            Some(limit) => sqlx::query(
                "SELECT * FROM (SELECT * FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT ?) ORDER BY id ASC",
            )
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::history)?,
            None => sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY id ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await
                .map_err(RagError::history)?,
        };

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role").map_err(RagError::history)?;
            let role = ChatRole::parse(&role)
                .ok_or_else(|| RagError::History(format!("unknown role in history: {}", role)))?;
            let created_at: String = row.try_get("created_at").map_err(RagError::history)?;

            messages.push(HistoryMessage {
                role,
                content: row.try_get("content").map_err(RagError::history)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|ts| ts.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            });
        }

        Ok(messages)
    }

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> Result<(), RagError> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(RagError::history)?;

        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(RagError::history)?;

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(RagError::history)?;

        for message in messages {
            sqlx::query(
                "INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(RagError::history)?;
        }

        tx.commit().await.map_err(RagError::history)?;
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool, RagError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(RagError::history)?;
        Ok(result.rows_affected() > 0)
    }

    async fn sessions(&self) -> Result<Vec<String>, RagError> {
        let rows = sqlx::query("SELECT id FROM sessions ORDER BY updated_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::history)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(RagError::history))
            .collect()
    }
}
