//! Conversational RAG chain.
//!
//! One invocation runs: history lookup → (standalone rewrite when history is
//! non-empty) → retrieval → context formatting → answer generation → history
//! append. Any failing step aborts the turn and leaves history untouched.

mod builder;
mod conversational;

pub use builder::RagChainBuilder;
pub use conversational::{ChainRequest, ConversationalRagChain};
