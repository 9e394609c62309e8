//! Conversational retrieval-augmented question answering over product reviews.
//!
//! [`chain::ConversationalRagChain`] rewrites follow-up questions into standalone
//! form, retrieves the top-k matching reviews from a [`rag::VectorStore`], and asks
//! a [`llm::ChatModel`] to answer from that context while keeping per-session
//! history in a [`history::HistoryStore`].

pub mod chain;
pub mod core;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;

pub use chain::{ConversationalRagChain, RagChainBuilder};
pub use core::errors::RagError;
