use super::template::{ChatPromptTemplate, PromptMessage};
use crate::llm::ChatRole;

pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str =
    "Given the chat history and user question, rewrite it as a standalone question.";

pub const ANSWER_SYSTEM_PROMPT: &str = "You're an e-commerce bot answering product-related queries using reviews and titles.\n\
Stick to context. Be concise and helpful.\n\nCONTEXT:\n{context}\n\nQUESTION: {input}";

pub const HISTORY_VARIABLE: &str = "chat_history";

/// Rewrites a follow-up question into a standalone one.
pub fn contextualize_prompt() -> ChatPromptTemplate {
    ChatPromptTemplate::from_messages(vec![
        PromptMessage::template(ChatRole::System, CONTEXTUALIZE_SYSTEM_PROMPT),
        PromptMessage::placeholder(HISTORY_VARIABLE),
        PromptMessage::template(ChatRole::User, "{input}"),
    ])
}

/// Answers from retrieved product context.
pub fn answer_prompt() -> ChatPromptTemplate {
    ChatPromptTemplate::from_messages(vec![
        PromptMessage::template(ChatRole::System, ANSWER_SYSTEM_PROMPT),
        PromptMessage::placeholder(HISTORY_VARIABLE),
        PromptMessage::template(ChatRole::User, "{input}"),
    ])
}
