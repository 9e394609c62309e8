use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::ChatRequest;
use crate::core::errors::RagError;

/// Maps a prompt (list of chat messages) to a text completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// provider name for logging (e.g. "groq")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, RagError>;

    /// chat completion (streaming)
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError>;
}

/// Maps texts to embedding vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}
