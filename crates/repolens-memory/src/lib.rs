//! Persistence for the indexing pipeline: repository records in `SQLite` and
//! vector collections behind the [`VectorStore`] trait.

pub mod catalog;
pub mod error;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod sqlite;
pub mod vector_store;

pub use catalog::{NewRepository, RepositoryCatalog, RepositoryRecord};
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use vector_store::{
    BoxFuture, FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError,
};
