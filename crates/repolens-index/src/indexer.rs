//! Repository indexing: resolve → checkout → extract → embed → store → flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use repolens_memory::RepositoryCatalog;

use crate::chunk::Chunk;
use crate::embedder::Embedder;
use crate::error::{IndexError, Result};
use crate::extractor::Extractor;
use crate::store::{EmbeddedChunk, RepoStore};
use crate::working_copy::WorkingCopy;

/// Summary of one successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub repo_id: i64,
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub code_chunks: usize,
    pub commit_chunks: usize,
    pub elapsed_ms: u64,
}

/// Builds a repository's collection from its working copy.
///
/// Runs for one repository id never overlap: a second call waits for the
/// first to finish, then indexes again. Different ids index concurrently.
pub struct Indexer {
    catalog: Arc<dyn RepositoryCatalog>,
    working_copy: Arc<dyn WorkingCopy>,
    extractor: Extractor,
    embedder: Arc<Embedder>,
    store: RepoStore,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("extractor", &self.extractor)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn RepositoryCatalog>,
        working_copy: Arc<dyn WorkingCopy>,
        extractor: Extractor,
        embedder: Arc<Embedder>,
        store: RepoStore,
    ) -> Self {
        Self {
            catalog,
            working_copy,
            extractor,
            embedder,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn RepositoryCatalog> {
        &self.catalog
    }

    fn repo_lock(&self, repo_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(repo_id).or_default())
    }

    fn release_lock(&self, repo_id: i64) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&repo_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&repo_id);
        }
    }

    /// Index one repository, replacing any previous contents of its collection.
    ///
    /// On failure the repository is left unindexed if its collection was
    /// already being rewritten; failures before that point leave the previous
    /// collection and flag untouched.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed.
    pub async fn index(&self, repo_id: i64) -> Result<IndexReport> {
        let lock = self.repo_lock(repo_id);
        let result = {
            let _guard = lock.lock().await;
            self.run(repo_id).await
        };
        drop(lock);
        self.release_lock(repo_id);

        match &result {
            Ok(report) => tracing::info!(
                repo_id,
                code_chunks = report.code_chunks,
                commit_chunks = report.commit_chunks,
                elapsed_ms = report.elapsed_ms,
                "repository indexed"
            ),
            Err(e) => tracing::warn!(repo_id, "indexing failed: {e}"),
        }
        result
    }

    async fn run(&self, repo_id: i64) -> Result<IndexReport> {
        let start = Instant::now();

        let record = self
            .catalog
            .get(repo_id)
            .await?
            .ok_or(IndexError::RepositoryNotFound(repo_id))?;
        let root = self.working_copy.resolve(&record)?;
        tracing::debug!(repo_id, root = %root.display(), "indexing working copy");

        let extraction = self.extractor.extract(&root).await?;
        let stats = extraction.stats;
        let code_chunks = extraction.code.len();
        let commit_chunks = extraction.commits.len();
        let chunks = extraction.into_chunks();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let dimension = match vectors.first() {
            Some(v) => u64::try_from(v.len())?,
            None => self.embedder.dimension().await?,
        };

        // The collection is about to be rewritten; until the final flag is
        // set, retrieval must not read it.
        self.catalog.set_indexed(repo_id, false).await?;

        if let Err(e) = self.write_store(repo_id, dimension, chunks, vectors).await {
            self.discard_store(repo_id).await;
            return Err(e);
        }
        if let Err(e) = self.catalog.set_indexed(repo_id, true).await {
            self.discard_store(repo_id).await;
            return Err(e.into());
        }

        Ok(IndexReport {
            repo_id,
            files_scanned: stats.files_scanned,
            files_parsed: stats.files_parsed,
            files_failed: stats.files_failed,
            code_chunks,
            commit_chunks,
            elapsed_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        })
    }

    async fn write_store(
        &self,
        repo_id: i64,
        dimension: u64,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<()> {
        let collection = self.store.recreate(repo_id, dimension).await?;
        let records: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();
        self.store.upsert(&collection, records).await?;
        Ok(())
    }

    async fn discard_store(&self, repo_id: i64) {
        if let Err(e) = self.store.drop_collection(repo_id).await {
            tracing::warn!(repo_id, "failed to drop partial collection: {e}");
        }
    }
}
