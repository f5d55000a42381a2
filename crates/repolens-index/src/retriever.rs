//! Question → snippets across every selected repository.

use std::collections::HashSet;
use std::sync::Arc;

use repolens_memory::RepositoryCatalog;

use crate::chunk::ChunkKind;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::estimate_tokens;
use crate::store::{ChunkFilter, QueryOutcome, RepoStore, StoredChunk};

pub const DEFAULT_PER_REPO_LIMIT: u64 = 3;

/// A snippet tagged with the repository it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub repo_id: i64,
    /// Display name (`full_name`) of the repository.
    pub repo: String,
    pub text: String,
    pub score: f32,
    pub kind: Option<ChunkKind>,
    pub path: Option<String>,
    pub name: Option<String>,
}

impl RetrievedChunk {
    fn from_stored(repo_id: i64, repo: &str, stored: StoredChunk) -> Self {
        let field = |key: &str| {
            stored
                .metadata
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        let path = field("path");
        let name = field("name");
        Self {
            repo_id,
            repo: repo.to_owned(),
            text: stored.text,
            score: stored.score,
            kind: stored.kind,
            path,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// The caller passed no repositories.
    NothingSelected,
    /// Repositories were given but none of them produced a match.
    NoRelevantContent,
    /// Matches grouped by repository in selection order, best first within each.
    Found(Vec<RetrievedChunk>),
}

#[derive(Debug, Clone, Copy)]
pub struct RetrieverConfig {
    pub per_repo_limit: u64,
    /// Token budget for the merged snippets; `0` disables packing.
    pub budget_tokens: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            per_repo_limit: DEFAULT_PER_REPO_LIMIT,
            budget_tokens: 0,
        }
    }
}

/// Read-only search over the per-repository collections.
pub struct MultiRepoRetriever {
    catalog: Arc<dyn RepositoryCatalog>,
    embedder: Arc<Embedder>,
    store: RepoStore,
    config: RetrieverConfig,
}

impl std::fmt::Debug for MultiRepoRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiRepoRetriever")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MultiRepoRetriever {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn RepositoryCatalog>,
        embedder: Arc<Embedder>,
        store: RepoStore,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            store,
            config: RetrieverConfig {
                per_repo_limit: config.per_repo_limit.max(1),
                ..config
            },
        }
    }

    /// Search every repository in `repo_ids` for code matching `question`.
    ///
    /// The question is embedded once. Repositories that are unknown, not yet
    /// indexed, missing a collection or failing to answer are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the question cannot be embedded.
    pub async fn retrieve(&self, question: &str, repo_ids: &[i64]) -> Result<Retrieval> {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = repo_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Ok(Retrieval::NothingSelected);
        }

        let vector = self.embedder.embed(question).await?;

        let mut merged = Vec::new();
        for repo_id in ids {
            let record = match self.catalog.get(repo_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    tracing::warn!(repo_id, "selected repository does not exist, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(repo_id, "failed to load repository record: {e}");
                    continue;
                }
            };
            if !record.indexed {
                tracing::debug!(repo_id, "repository not indexed, skipping");
                continue;
            }

            let outcome = self
                .store
                .query(
                    repo_id,
                    vector.clone(),
                    self.config.per_repo_limit,
                    ChunkFilter::ExcludeCommits,
                )
                .await;
            match outcome {
                Ok(QueryOutcome::Hits(hits)) => {
                    tracing::debug!(repo_id, hits = hits.len(), "repository searched");
                    merged.extend(
                        hits.into_iter()
                            .map(|h| RetrievedChunk::from_stored(repo_id, &record.full_name, h)),
                    );
                }
                Ok(QueryOutcome::NotFound) => {
                    tracing::debug!(repo_id, "collection missing, skipping");
                }
                Err(e) => tracing::warn!(repo_id, "search failed: {e}"),
            }
        }

        let merged = pack(merged, self.config.budget_tokens);
        if merged.is_empty() {
            Ok(Retrieval::NoRelevantContent)
        } else {
            Ok(Retrieval::Found(merged))
        }
    }
}

/// Keep chunks in order until `budget` is spent; the first chunk always fits.
fn pack(chunks: Vec<RetrievedChunk>, budget: usize) -> Vec<RetrievedChunk> {
    if budget == 0 {
        return chunks;
    }
    let total = chunks.len();
    let mut used = 0;
    let mut kept = Vec::with_capacity(total);
    for chunk in chunks {
        let cost = estimate_tokens(&chunk.text);
        if !kept.is_empty() && used + cost > budget {
            break;
        }
        used += cost;
        kept.push(chunk);
    }
    if kept.len() < total {
        tracing::debug!(
            kept = kept.len(),
            dropped = total - kept.len(),
            budget,
            "context budget reached"
        );
    }
    kept
}
