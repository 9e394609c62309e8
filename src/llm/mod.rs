pub mod openai;
pub mod provider;
pub mod types;

pub use openai::{OpenAiCompatibleChat, OpenAiCompatibleEmbedder};
pub use provider::{ChatModel, Embedder};
pub use types::{ChatMessage, ChatRequest, ChatRole};
