//! Error types for repolens-index.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Memory(#[from] repolens_memory::MemoryError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] repolens_memory::VectorStoreError),

    /// Embedding or completion provider failure.
    #[error("LLM error: {0}")]
    Llm(#[from] repolens_llm::LlmError),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("repository {0} not found")]
    RepositoryNotFound(i64),

    /// The working copy directory is absent; extraction cannot start.
    #[error("working copy not found: {}", .0.display())]
    WorkingCopyMissing(PathBuf),

    #[error("duplicate chunk id {0} in one upsert")]
    DuplicateChunkId(String),

    #[error("embedding returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
