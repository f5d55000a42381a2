//! Where a repository's files live on disk.

use std::path::PathBuf;

use repolens_memory::RepositoryRecord;

use crate::error::Result;

/// Resolves a repository record to a working directory.
///
/// Fetching and cloning happen elsewhere; implementations only report where
/// the checkout is.
pub trait WorkingCopy: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the checkout location cannot be determined.
    fn resolve(&self, repo: &RepositoryRecord) -> Result<PathBuf>;
}

/// Uses the record's `local_path`, or `{repos_dir}/{id}` when it has none.
#[derive(Debug, Clone)]
pub struct DirectoryCheckout {
    repos_dir: PathBuf,
}

impl DirectoryCheckout {
    #[must_use]
    pub fn new(repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            repos_dir: repos_dir.into(),
        }
    }
}

impl WorkingCopy for DirectoryCheckout {
    fn resolve(&self, repo: &RepositoryRecord) -> Result<PathBuf> {
        Ok(repo.local_path.as_ref().map_or_else(
            || self.repos_dir.join(repo.id.to_string()),
            PathBuf::from,
        ))
    }
}
