//! Repository records: the metadata the indexer resolves and the flags it persists.

use crate::error::MemoryError;
use crate::vector_store::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Display name, e.g. `owner/name`. Used to tag retrieved sources.
    pub full_name: String,
    /// Working-copy directory when the repository lives outside `repos_dir`.
    pub local_path: Option<String>,
    pub selected: bool,
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub user_id: i64,
    pub name: String,
    pub full_name: String,
    pub local_path: Option<String>,
}

pub trait RepositoryCatalog: Send + Sync {
    fn add(&self, repo: NewRepository) -> BoxFuture<'_, Result<RepositoryRecord, MemoryError>>;

    fn get(&self, id: i64) -> BoxFuture<'_, Result<Option<RepositoryRecord>, MemoryError>>;

    /// All records, or those of one user when `user_id` is set, ordered by id.
    fn list(
        &self,
        user_id: Option<i64>,
    ) -> BoxFuture<'_, Result<Vec<RepositoryRecord>, MemoryError>>;

    fn selected_ids(&self, user_id: i64) -> BoxFuture<'_, Result<Vec<i64>, MemoryError>>;

    /// # Errors
    ///
    /// `MemoryError::RepositoryNotFound` when no record has this id.
    fn set_selected(&self, id: i64, selected: bool) -> BoxFuture<'_, Result<(), MemoryError>>;

    /// # Errors
    ///
    /// `MemoryError::RepositoryNotFound` when no record has this id.
    fn set_indexed(&self, id: i64, indexed: bool) -> BoxFuture<'_, Result<(), MemoryError>>;
}
