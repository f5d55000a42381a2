use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
    Compatible,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn default_base_url() -> String {
    "http://localhost:11434".into()
}

pub(crate) fn default_model() -> String {
    "llama3.1:8b".into()
}

pub(crate) fn default_embedding_model() -> String {
    "all-minilm".into()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_compatible_name() -> String {
    "compatible".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat model used to synthesize answers.
    #[serde(default = "default_model")]
    pub model: String,
    /// Embedding model shared by indexing and retrieval.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Display name of an OpenAI-compatible host, used in logs and errors.
    #[serde(default = "default_compatible_name")]
    pub compatible_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            compatible_name: default_compatible_name(),
            api_key: None,
        }
    }
}

/// Vector store backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    Memory,
}

fn default_sqlite_path() -> String {
    "data/repolens.db".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection_prefix() -> String {
    "repo".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default)]
    pub vector_backend: VectorBackend,
    /// Collections are named `{collection_prefix}_{repo_id}`.
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            qdrant_url: default_qdrant_url(),
            vector_backend: VectorBackend::default(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("data/repos")
}

fn default_function_window() -> usize {
    40
}

fn default_class_window() -> usize {
    80
}

fn default_max_file_bytes() -> u64 {
    1_048_576
}

fn default_embed_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Checkouts without an explicit path live at `{repos_dir}/{repo_id}`.
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,
    /// Lines captured after a pattern-matched function header.
    #[serde(default = "default_function_window")]
    pub function_window: usize,
    /// Lines captured after a pattern-matched class header.
    #[serde(default = "default_class_window")]
    pub class_window: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            function_window: default_function_window(),
            class_window: default_class_window(),
            max_file_bytes: default_max_file_bytes(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_per_repo_limit() -> u64 {
    3
}

fn default_context_budget_tokens() -> usize {
    6000
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_per_repo_limit")]
    pub per_repo_limit: u64,
    /// `0` sends every retrieved snippet.
    #[serde(default = "default_context_budget_tokens")]
    pub context_budget_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_repo_limit: default_per_repo_limit(),
            context_budget_tokens: default_context_budget_tokens(),
        }
    }
}
