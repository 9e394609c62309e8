use super::AppConfig;
use crate::core::errors::RagError;

pub fn validate_config(config: &AppConfig) -> Result<(), RagError> {
    if config.llm.model.trim().is_empty() {
        return Err(config_error("llm.model", "must not be empty"));
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(config_error(
            "llm.temperature",
            &format!("must be within 0.0..=2.0, got {}", config.llm.temperature),
        ));
    }
    if config.llm.max_tokens == Some(0) {
        return Err(config_error("llm.max_tokens", "must be greater than 0"));
    }
    if config.retrieval.top_k == 0 {
        return Err(config_error("retrieval.top_k", "must be greater than 0"));
    }
    validate_positive(config.history.max_sessions, "history.max_sessions")?;
    validate_positive(
        config.history.max_messages_per_session,
        "history.max_messages_per_session",
    )?;
    if config.history.idle_ttl_secs == Some(0) {
        return Err(config_error("history.idle_ttl_secs", "must be greater than 0"));
    }
    Ok(())
}

fn validate_positive(value: Option<usize>, field: &str) -> Result<(), RagError> {
    match value {
        Some(0) => Err(config_error(field, "must be greater than 0")),
        _ => Ok(()),
    }
}

fn config_error(field: &str, message: &str) -> RagError {
    RagError::Config(format!("{field} {message}"))
}
