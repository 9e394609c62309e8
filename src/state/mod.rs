use std::path::PathBuf;
use std::sync::Arc;

use crate::chain::{ConversationalRagChain, RagChainBuilder};
use crate::core::config::{AppConfig, HistoryBackend};
use crate::history::{HistoryLimits, HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
use crate::llm::{OpenAiCompatibleChat, OpenAiCompatibleEmbedder};
use crate::rag::{load_documents, InMemoryVectorStore, VectorStore};

pub mod error;

use error::InitializationError;

const DEFAULT_HISTORY_DB: &str = "rag_history.db";

/// Shared state behind the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chain: Arc<ConversationalRagChain>,
}

impl AppState {
    pub fn new(config: AppConfig, chain: ConversationalRagChain) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            chain: Arc::new(chain),
        })
    }

    /// Builds the chat model, vector store (seeded from `server.documents_path`),
    /// history backend and chain described by `config`.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, InitializationError> {
        if config.llm.api_key.is_none() {
            tracing::warn!("No API key configured for {}; requests may be rejected", config.llm.base_url);
        }

        let model = OpenAiCompatibleChat::from_config(&config.llm)
            .map_err(|e| InitializationError::Llm(e.into()))?;

        let embedder = OpenAiCompatibleEmbedder::from_config(&config.embedding)
            .map_err(|e| InitializationError::VectorStore(e.into()))?;
        let vector_store = InMemoryVectorStore::new(embedder);
        if let Some(path) = &config.server.documents_path {
            let documents =
                load_documents(path).map_err(|e| InitializationError::VectorStore(e.into()))?;
            let added = vector_store
                .add_documents(documents)
                .await
                .map_err(|e| InitializationError::VectorStore(e.into()))?;
            tracing::info!("Vector store seeded with {} documents", added);
        } else {
            tracing::warn!("server.documents_path not set; retrieval will return no context");
        }

        let history = build_history_store(&config)
            .await
            .map_err(InitializationError::History)?;

        let chain = RagChainBuilder::new(Arc::new(model), Arc::new(vector_store))
            .with_config(&config)
            .with_history(history)
            .build();

        tracing::info!("Chain ready: model={} top_k={}", config.llm.model, config.retrieval.top_k);
        Ok(Self::new(config, chain))
    }
}

async fn build_history_store(config: &AppConfig) -> anyhow::Result<Arc<dyn HistoryStore>> {
    let limits = HistoryLimits::from(&config.history);
    match config.history.backend {
        HistoryBackend::Memory => Ok(Arc::new(InMemoryHistoryStore::new(limits))),
        HistoryBackend::Sqlite => {
            let db_path = config
                .history
                .db_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DB));
            let store = SqliteHistoryStore::new(db_path, limits).await?;
            tracing::info!("Chat history persisted to {}", store.db_path().display());
            Ok(Arc::new(store))
        }
    }
}
