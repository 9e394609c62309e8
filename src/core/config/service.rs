use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::validation::validate_config;
use super::AppConfig;
use crate::core::errors::RagError;

const CONFIG_PATH_ENV: &str = "RAG_CONFIG_PATH";

/// Resolves and loads the YAML configuration, then applies environment overrides.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
}

impl ConfigService {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Uses `RAG_CONFIG_PATH`, falling back to `./config.yml`.
    pub fn from_env() -> Self {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.yml"));
        Self::new(Some(path))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load_config(&self) -> Result<AppConfig, RagError> {
        let mut config = match self.path.as_deref() {
            Some(path) if path.exists() => load_yaml_file(path)?,
            Some(path) => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        apply_env_overrides(&mut config, |key| env::var(key).ok());
        validate_config(&config)?;
        Ok(config)
    }
}

fn load_yaml_file(path: &Path) -> Result<AppConfig, RagError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| RagError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str::<AppConfig>(&contents)
        .map_err(|e| RagError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(model) = lookup("RAG_MODEL").filter(|v| !v.trim().is_empty()) {
        config.llm.model = model;
    }
    if let Some(key) = lookup("GROQ_API_KEY").filter(|v| !v.trim().is_empty()) {
        config.llm.api_key = Some(key);
    }
    if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
        config.server.port = port;
    }
    if let Some(top_k) = lookup("RAG_TOP_K").and_then(|v| v.parse::<usize>().ok()) {
        config.retrieval.top_k = top_k;
    }
}
