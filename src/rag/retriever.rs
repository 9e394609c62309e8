use std::sync::Arc;

use super::document::Document;
use super::store::VectorStore;
use crate::core::config::DEFAULT_TOP_K;
use crate::core::errors::RagError;

/// Fixed-`k` view over a vector store. Results are returned exactly as the store ranks them.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self::with_k(store, DEFAULT_TOP_K)
    }

    pub fn with_k(store: Arc<dyn VectorStore>, k: usize) -> Self {
        Self { store, k: k.max(1) }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RagError> {
        let mut documents = self.store.similarity_search(query, self.k).await?;
        documents.truncate(self.k);
        Ok(documents)
    }
}
