//! One vector collection per repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use repolens_memory::{FieldValue, VectorFilter, VectorPoint, VectorStore};

use crate::chunk::{Chunk, ChunkKind};
use crate::error::{IndexError, Result};

const UPSERT_BATCH: usize = 256;
const DOCUMENT_FIELD: &str = "document";
const CHUNK_ID_FIELD: &str = "chunk_id";

/// Handle to a repository's collection, returned by [`RepoStore::open_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCollection {
    pub repo_id: i64,
    pub name: String,
}

/// A chunk with its embedding, ready to store.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Which records a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkFilter {
    #[default]
    All,
    /// Functions and classes only.
    ExcludeCommits,
    Only(ChunkKind),
}

impl ChunkFilter {
    fn to_vector_filter(self) -> Option<VectorFilter> {
        let kind = |k: ChunkKind| FieldValue::Text(k.as_str().to_owned());
        match self {
            Self::All => None,
            Self::ExcludeCommits => Some(VectorFilter::exclude("type", kind(ChunkKind::Commit))),
            Self::Only(k) => Some(VectorFilter {
                must: vec![repolens_memory::FieldCondition {
                    field: "type".into(),
                    value: kind(k),
                }],
                must_not: Vec::new(),
            }),
        }
    }
}

/// A stored record returned by a query, most similar first.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub kind: Option<ChunkKind>,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug)]
pub enum QueryOutcome {
    /// The repository has no collection; treat as zero results.
    NotFound,
    Hits(Vec<StoredChunk>),
}

impl QueryOutcome {
    #[must_use]
    pub fn into_hits(self) -> Vec<StoredChunk> {
        match self {
            Self::NotFound => Vec::new(),
            Self::Hits(hits) => hits,
        }
    }
}

/// Per-repository collections over a shared [`VectorStore`].
#[derive(Clone)]
pub struct RepoStore {
    vectors: Arc<dyn VectorStore>,
    prefix: String,
}

impl std::fmt::Debug for RepoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RepoStore {
    #[must_use]
    pub fn new(vectors: Arc<dyn VectorStore>, prefix: impl Into<String>) -> Self {
        Self {
            vectors,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn collection_name(&self, repo_id: i64) -> String {
        format!("{}_{repo_id}", self.prefix)
    }

    fn handle(&self, repo_id: i64) -> RepoCollection {
        RepoCollection {
            repo_id,
            name: self.collection_name(repo_id),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    pub(crate) async fn exists(&self, repo_id: i64) -> Result<bool> {
        Ok(self
            .vectors
            .collection_exists(&self.collection_name(repo_id))
            .await?)
    }

    /// Open the repository's collection, creating it empty if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the collection.
    pub async fn open_or_create(&self, repo_id: i64, dimension: u64) -> Result<RepoCollection> {
        let handle = self.handle(repo_id);
        self.vectors.ensure_collection(&handle.name, dimension).await?;
        Ok(handle)
    }

    /// Drop any existing collection and create an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion or creation fails.
    pub async fn recreate(&self, repo_id: i64, dimension: u64) -> Result<RepoCollection> {
        self.drop_collection(repo_id).await?;
        self.open_or_create(repo_id, dimension).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion.
    pub async fn drop_collection(&self, repo_id: i64) -> Result<()> {
        Ok(self
            .vectors
            .delete_collection(&self.collection_name(repo_id))
            .await?)
    }

    /// Write records into the collection. Ids must be unique within the call.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateChunkId` before writing anything if two records share
    /// an id, or the backend error if a write fails.
    pub async fn upsert(
        &self,
        collection: &RepoCollection,
        records: Vec<EmbeddedChunk>,
    ) -> Result<usize> {
        {
            let mut seen = HashSet::with_capacity(records.len());
            if let Some(dup) = records.iter().find(|r| !seen.insert(r.chunk.id.as_str())) {
                return Err(IndexError::DuplicateChunkId(dup.chunk.id.clone()));
            }
        }

        let total = records.len();
        let points: Vec<VectorPoint> = records
            .into_iter()
            .map(|r| to_point(collection.repo_id, r))
            .collect();

        let mut remaining = points.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<VectorPoint> = remaining.by_ref().take(UPSERT_BATCH).collect();
            self.vectors.upsert(&collection.name, batch).await?;
        }
        tracing::debug!(collection = %collection.name, records = total, "upserted");
        Ok(total)
    }

    /// Return up to `k` records, most similar first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails; a missing collection is
    /// `QueryOutcome::NotFound`, not an error.
    pub async fn query(
        &self,
        repo_id: i64,
        vector: Vec<f32>,
        k: u64,
        filter: ChunkFilter,
    ) -> Result<QueryOutcome> {
        if !self.exists(repo_id).await? {
            return Ok(QueryOutcome::NotFound);
        }
        let name = self.collection_name(repo_id);
        let hits = self
            .vectors
            .search(&name, vector, k, filter.to_vector_filter())
            .await?;
        Ok(QueryOutcome::Hits(
            hits.into_iter()
                .map(|hit| {
                    let mut metadata = hit.payload;
                    let text = take_string(&mut metadata, DOCUMENT_FIELD);
                    let chunk_id = take_string(&mut metadata, CHUNK_ID_FIELD);
                    let kind = metadata
                        .get("type")
                        .and_then(serde_json::Value::as_str)
                        .and_then(ChunkKind::parse);
                    StoredChunk {
                        chunk_id,
                        text,
                        kind,
                        score: hit.score,
                        metadata,
                    }
                })
                .collect(),
        ))
    }

    /// # Errors
    ///
    /// Returns an error if the collection is missing or the backend fails.
    pub async fn count(&self, repo_id: i64) -> Result<u64> {
        Ok(self.vectors.count(&self.collection_name(repo_id)).await?)
    }
}

/// Stable point id: re-indexing the same chunk id overwrites instead of duplicating.
#[must_use]
pub fn point_id(repo_id: i64, chunk_id: &str) -> String {
    uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_OID,
        format!("{repo_id}/{chunk_id}").as_bytes(),
    )
    .to_string()
}

fn to_point(repo_id: i64, record: EmbeddedChunk) -> VectorPoint {
    let mut payload = record.chunk.metadata();
    payload.insert(CHUNK_ID_FIELD.into(), record.chunk.id.as_str().into());
    payload.insert(DOCUMENT_FIELD.into(), record.chunk.text.into());
    VectorPoint {
        id: point_id(repo_id, &record.chunk.id),
        vector: record.vector,
        payload,
    }
}

fn take_string(map: &mut HashMap<String, serde_json::Value>, key: &str) -> String {
    match map.remove(key) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
