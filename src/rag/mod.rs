//! Retrieval side of the RAG chain.
//!
//! This module provides:
//! - `Document`: a retrievable text unit with metadata
//! - `VectorStore`: the similarity-search capability the chain depends on
//! - `InMemoryVectorStore`: an embedder-backed store ranked by cosine similarity
//! - `Retriever`: a fixed-`k` view over a store
//! - `format_docs`: joins retrieved texts into one context block

mod context_builder;
mod document;
pub mod loader;
mod memory;
mod retriever;
mod store;

pub use context_builder::{format_docs, DOCUMENT_SEPARATOR};
pub use document::Document;
pub use loader::load_documents;
pub use memory::InMemoryVectorStore;
pub use retriever::Retriever;
pub use store::VectorStore;
