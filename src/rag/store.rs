//! Similarity-search backends behind a single async trait.

use async_trait::async_trait;

use super::document::Document;
use crate::core::errors::RagError;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The `k` most similar documents for `query`, best first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, RagError>;

    /// Index documents, returning how many were added.
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, RagError>;
}
