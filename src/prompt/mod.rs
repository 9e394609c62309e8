//! Chat prompt templates.
//!
//! A template is an ordered list of role-tagged string templates and history
//! placeholders. Formatting substitutes `{name}` variables and splices bound
//! message lists into placeholder slots.

mod defaults;
mod template;

pub use defaults::{answer_prompt, contextualize_prompt, ANSWER_SYSTEM_PROMPT, CONTEXTUALIZE_SYSTEM_PROMPT};
pub use template::{ChatPromptTemplate, PromptMessage, PromptValues};
