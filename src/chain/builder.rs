use std::sync::Arc;

use super::conversational::ConversationalRagChain;
use crate::core::config::{AppConfig, DEFAULT_TEMPERATURE, DEFAULT_TOP_K};
use crate::history::{HistoryStore, InMemoryHistoryStore};
use crate::llm::ChatModel;
use crate::prompt::{answer_prompt, contextualize_prompt};
use crate::rag::{Retriever, VectorStore};

/// Assembles a [`ConversationalRagChain`] from a model and a vector store.
pub struct RagChainBuilder {
    model: Arc<dyn ChatModel>,
    vector_store: Arc<dyn VectorStore>,
    history: Option<Arc<dyn HistoryStore>>,
    top_k: usize,
    temperature: f64,
    max_tokens: Option<u32>,
}

impl RagChainBuilder {
    pub fn new(model: Arc<dyn ChatModel>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            model,
            vector_store,
            history: None,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    /// Applies `retrieval.top_k`, `llm.temperature` and `llm.max_tokens`.
    pub fn with_config(self, config: &AppConfig) -> Self {
        self.with_top_k(config.retrieval.top_k)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> ConversationalRagChain {
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::default()));

        ConversationalRagChain {
            model: self.model,
            retriever: Retriever::with_k(self.vector_store, self.top_k),
            history,
            contextualize_prompt: contextualize_prompt(),
            answer_prompt: answer_prompt(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
