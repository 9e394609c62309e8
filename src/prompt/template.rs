use std::collections::HashMap;

use crate::core::errors::RagError;
use crate::llm::{ChatMessage, ChatRole};

/// One slot of a chat prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptMessage {
    /// A message whose content is rendered from `{variable}` substitutions.
    Template { role: ChatRole, template: String },
    /// Spliced with the message list bound to `variable`.
    Placeholder { variable: String },
}

impl PromptMessage {
    pub fn template(role: ChatRole, template: impl Into<String>) -> Self {
        PromptMessage::Template {
            role,
            template: template.into(),
        }
    }

    pub fn placeholder(variable: impl Into<String>) -> Self {
        PromptMessage::Placeholder {
            variable: variable.into(),
        }
    }
}

/// Variables bound for one formatting pass.
#[derive(Debug, Clone, Default)]
pub struct PromptValues {
    text: HashMap<String, String>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

impl PromptValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.insert(name.into(), value.into());
        self
    }

    pub fn with_messages(mut self, name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        self.messages.insert(name.into(), messages);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPromptTemplate {
    messages: Vec<PromptMessage>,
}

impl ChatPromptTemplate {
    pub fn from_messages(messages: Vec<PromptMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    /// String variables referenced by the templates, in order of first use.
    pub fn input_variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for message in &self.messages {
            if let PromptMessage::Template { template, .. } = message {
                for segment in parse_segments(template).unwrap_or_default() {
                    if let Segment::Variable(name) = segment {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
            }
        }
        names
    }

    pub fn format(&self, values: &PromptValues) -> Result<Vec<ChatMessage>, RagError> {
        let mut rendered = Vec::with_capacity(self.messages.len());

        for message in &self.messages {
            match message {
                PromptMessage::Template { role, template } => {
                    let content = render(template, &values.text)?;
                    rendered.push(ChatMessage::new(*role, content));
                }
                PromptMessage::Placeholder { variable } => {
                    let bound = values.messages.get(variable).ok_or_else(|| {
                        RagError::Prompt(format!("missing messages for placeholder '{}'", variable))
                    })?;
                    rendered.extend(bound.iter().cloned());
                }
            }
        }

        Ok(rendered)
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Splits a template into literal text and `{name}` references. `{{` and `}}` escape braces.
fn parse_segments(template: &str) -> Result<Vec<Segment>, RagError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                let name = name.trim().to_string();
                if !closed || name.is_empty() {
                    return Err(RagError::Prompt(format!(
                        "malformed variable in template: {:?}",
                        template
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name));
            }
            '}' => {
                return Err(RagError::Prompt(format!(
                    "unmatched '}}' in template: {:?}",
                    template
                )));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn render(template: &str, values: &HashMap<String, String>) -> Result<String, RagError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse_segments(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Variable(name) => {
                let value = values
                    .get(&name)
                    .ok_or_else(|| RagError::Prompt(format!("missing variable '{}'", name)))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qa_template() -> ChatPromptTemplate {
        ChatPromptTemplate::from_messages(vec![
            PromptMessage::template(ChatRole::System, "CONTEXT:\n{context}\n\nQUESTION: {input}"),
            PromptMessage::placeholder("chat_history"),
            PromptMessage::template(ChatRole::User, "{input}"),
        ])
    }

    #[test]
    fn substitutes_variables_and_splices_history() {
        let history = vec![
            ChatMessage::user("Is this phone waterproof?"),
            ChatMessage::assistant("Yes, IP68."),
        ];
        let values = PromptValues::new()
            .with_text("context", "Great phone, survived the pool.")
            .with_text("input", "What about battery life?")
            .with_messages("chat_history", history.clone());

        let messages = qa_template().format(&values).expect("format");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(
            messages[0].content,
            "CONTEXT:\nGreat phone, survived the pool.\n\nQUESTION: What about battery life?"
        );
        assert_eq!(&messages[1..3], &history[..]);
        assert_eq!(messages[3], ChatMessage::user("What about battery life?"));
    }

    #[test]
    fn empty_history_adds_no_messages() {
        let values = PromptValues::new()
            .with_text("context", "")
            .with_text("input", "hi")
            .with_messages("chat_history", Vec::new());
        assert_eq!(qa_template().format(&values).expect("format").len(), 2);
    }

    #[test]
    fn missing_variable_is_prompt_error() {
        let values = PromptValues::new()
            .with_text("input", "hi")
            .with_messages("chat_history", Vec::new());
        let err = qa_template().format(&values).expect_err("context missing");
        assert!(matches!(err, RagError::Prompt(msg) if msg.contains("context")));
    }

    #[test]
    fn missing_placeholder_binding_is_prompt_error() {
        let values = PromptValues::new().with_text("context", "c").with_text("input", "i");
        assert!(matches!(qa_template().format(&values), Err(RagError::Prompt(_))));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = ChatPromptTemplate::from_messages(vec![PromptMessage::template(
            ChatRole::User,
            "json: {{\"q\": \"{input}\"}}",
        )]);
        let messages = template
            .format(&PromptValues::new().with_text("input", "price"))
            .expect("format");
        assert_eq!(messages[0].content, "json: {\"q\": \"price\"}");
        assert_eq!(template.input_variables(), vec!["input"]);
    }

    #[test]
    fn substituted_values_are_not_reparsed() {
        let template = ChatPromptTemplate::from_messages(vec![PromptMessage::template(
            ChatRole::User,
            "{input}",
        )]);
        let messages = template
            .format(&PromptValues::new().with_text("input", "does {context} leak?"))
            .expect("format");
        assert_eq!(messages[0].content, "does {context} leak?");
    }

    #[test]
    fn unclosed_variable_is_rejected() {
        assert!(parse_segments("hello {input").is_err());
        assert!(parse_segments("stray }").is_err());
    }
}
