mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.embedding_model.trim().is_empty() {
            bail!("llm.embedding_model must not be empty");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than zero");
        }
        if self.llm.provider != ProviderKind::Ollama && self.llm.api_key.is_none() {
            bail!(
                "llm.api_key (or REPOLENS_LLM_API_KEY) is required for the {} provider",
                self.llm.provider
            );
        }
        if self.index.function_window == 0 || self.index.class_window == 0 {
            bail!("index.function_window and index.class_window must be greater than zero");
        }
        if self.index.max_file_bytes == 0 {
            bail!("index.max_file_bytes must be greater than zero");
        }
        if self.index.embed_batch_size == 0 {
            bail!("index.embed_batch_size must be greater than zero");
        }
        if self.retrieval.per_repo_limit == 0 {
            bail!("retrieval.per_repo_limit must be greater than zero");
        }
        if self.storage.collection_prefix.trim().is_empty() {
            bail!("storage.collection_prefix must not be empty");
        }
        Ok(())
    }
}
