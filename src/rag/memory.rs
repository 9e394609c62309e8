//! In-process vector store backed by an [`Embedder`].

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::document::Document;
use super::store::VectorStore;
use crate::core::errors::RagError;
use crate::llm::Embedder;
use crate::vector_math::rank_descending_by_cosine;

struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

pub struct InMemoryVectorStore<E> {
    embedder: E,
    entries: RwLock<Vec<Entry>>,
}

impl<E: Embedder> InMemoryVectorStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<E: Embedder> VectorStore for InMemoryVectorStore<E> {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, RagError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding returned for query".to_string()))?;

        let entries = self.entries.read().await;
        let candidates: Vec<Vec<f32>> = entries.iter().map(|e| e.embedding.clone()).collect();
        let ranked = rank_descending_by_cosine(&query_embedding, &candidates)?;

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, _)| entries[idx].document.clone())
            .collect())
    }

    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, RagError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let added = documents.len();
        let mut entries = self.entries.write().await;
        entries.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .map(|(document, embedding)| Entry { document, embedding }),
        );
        tracing::debug!("Indexed {} documents ({} total)", added, entries.len());
        Ok(added)
    }
}
