use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::errors::RagError;
use crate::history::HistoryStore;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::prompt::{ChatPromptTemplate, PromptValues};
use crate::rag::{format_docs, Retriever};

const HISTORY_KEY: &str = "chat_history";

/// Inputs of a single turn as they flow between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub input: String,
    pub chat_history: Vec<ChatMessage>,
    pub session_id: String,
}

impl ChainRequest {
    fn prompt_values(&self) -> PromptValues {
        PromptValues::new()
            .with_text("input", self.input.clone())
            .with_messages(HISTORY_KEY, self.chat_history.clone())
    }
}

pub struct ConversationalRagChain {
    pub(super) model: Arc<dyn ChatModel>,
    pub(super) retriever: Retriever,
    pub(super) history: Arc<dyn HistoryStore>,
    pub(super) contextualize_prompt: ChatPromptTemplate,
    pub(super) answer_prompt: ChatPromptTemplate,
    pub(super) temperature: f64,
    pub(super) max_tokens: Option<u32>,
}

impl ConversationalRagChain {
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answers `input` within `session_id`, recording the exchange in the session's history.
    pub async fn invoke(&self, input: &str, session_id: &str) -> Result<String, RagError> {
        let request = self.prepare(input, session_id).await?;
        let answer_request = self.build_answer_request(&request).await?;

        let answer = self.model.chat(answer_request).await.map_err(|e| {
            tracing::warn!("Answer generation failed for session {}: {}", session_id, e);
            e
        })?;

        self.history
            .append(
                session_id,
                vec![ChatMessage::user(input), ChatMessage::assistant(answer.clone())],
            )
            .await?;

        tracing::debug!(
            "Session {} answered ({} history messages before turn)",
            session_id,
            request.chat_history.len()
        );
        Ok(answer)
    }

    /// Streaming variant of [`invoke`](Self::invoke).
    ///
    /// Chunks are forwarded as they arrive. The turn is appended to history once
    /// the model stream ends cleanly; an upstream error is forwarded and the turn
    /// is dropped, as is a turn whose receiver goes away mid-stream.
    pub async fn stream(
        &self,
        input: &str,
        session_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
        let request = self.prepare(input, session_id).await?;
        let answer_request = self.build_answer_request(&request).await?;
        let mut upstream = self.model.stream_chat(answer_request).await?;

        let (tx, rx) = mpsc::channel(32);
        let history = self.history.clone();
        let session_id = session_id.to_string();
        let input = input.to_string();

        tokio::spawn(async move {
            let mut answer = String::new();
            while let Some(item) = upstream.recv().await {
                match item {
                    Ok(chunk) => {
                        answer.push_str(&chunk);
                        if tx.send(Ok(chunk)).await.is_err() {
                            tracing::debug!("Stream receiver for session {} dropped", session_id);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Answer stream failed for session {}: {}", session_id, e);
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            let turn = vec![ChatMessage::user(input), ChatMessage::assistant(answer)];
            if let Err(e) = history.append(&session_id, turn).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(rx)
    }

    /// Rewrites `request.input` into a standalone question using the chat history.
    pub async fn contextualize(&self, request: &ChainRequest) -> Result<String, RagError> {
        let messages = self.contextualize_prompt.format(&request.prompt_values())?;
        let rewritten = self.model.chat(self.chat_request(messages)).await.map_err(|e| {
            tracing::warn!("Contextualization failed for session {}: {}", request.session_id, e);
            e
        })?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Ok(request.input.clone());
        }
        Ok(rewritten.to_string())
    }

    /// Retrieval query for this turn: the raw input on a cold session, a rewrite otherwise.
    pub async fn retrieval_query(&self, request: &ChainRequest) -> Result<String, RagError> {
        if request.chat_history.is_empty() {
            return Ok(request.input.clone());
        }
        self.contextualize(request).await
    }

    async fn prepare(&self, input: &str, session_id: &str) -> Result<ChainRequest, RagError> {
        if input.trim().is_empty() {
            return Err(RagError::InvalidInput("input must not be empty".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(RagError::InvalidInput("session_id must not be empty".to_string()));
        }

        let chat_history = self
            .history
            .messages(session_id)
            .await?
            .iter()
            .map(|m| m.to_chat())
            .collect();

        Ok(ChainRequest {
            input: input.to_string(),
            chat_history,
            session_id: session_id.to_string(),
        })
    }

    async fn build_answer_request(&self, request: &ChainRequest) -> Result<ChatRequest, RagError> {
        let query = self.retrieval_query(request).await?;
        let documents = self.retriever.retrieve(&query).await.map_err(|e| {
            tracing::warn!("Retrieval failed for session {}: {}", request.session_id, e);
            e
        })?;
        tracing::debug!(
            "Session {}: retrieved {} documents (contextualized: {})",
            request.session_id,
            documents.len(),
            !request.chat_history.is_empty()
        );

        let values = request
            .prompt_values()
            .with_text("context", format_docs(&documents));
        let messages = self.answer_prompt.format(&values)?;
        Ok(self.chat_request(messages))
    }

    fn chat_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest::new(messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}
