use std::path::PathBuf;

use super::{Config, VectorBackend};
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_storage();
        self.apply_env_overrides_index();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid REPOLENS_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_API_KEY")
            && !v.is_empty()
        {
            self.llm.api_key = Some(Secret::new(v));
        }
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_SQLITE_PATH") {
            self.storage.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_QDRANT_URL") {
            self.storage.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_VECTOR_BACKEND") {
            match serde_json::from_value::<VectorBackend>(serde_json::Value::String(v.clone())) {
                Ok(backend) => self.storage.vector_backend = backend,
                Err(_) => tracing::warn!("ignoring invalid REPOLENS_VECTOR_BACKEND value: {v}"),
            }
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_REPOS_DIR") {
            self.index.repos_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("REPOLENS_RETRIEVAL_PER_REPO_LIMIT") {
            match v.parse::<u64>() {
                Ok(limit) => self.retrieval.per_repo_limit = limit,
                Err(_) => {
                    tracing::warn!("ignoring invalid REPOLENS_RETRIEVAL_PER_REPO_LIMIT value: {v}");
                }
            }
        }
        if let Ok(v) = std::env::var("REPOLENS_RETRIEVAL_BUDGET_TOKENS") {
            match v.parse::<usize>() {
                Ok(tokens) => self.retrieval.context_budget_tokens = tokens,
                Err(_) => {
                    tracing::warn!("ignoring invalid REPOLENS_RETRIEVAL_BUDGET_TOKENS value: {v}");
                }
            }
        }
    }
}
