//! Text to vectors through the shared provider.

use std::sync::Arc;

use repolens_llm::any::AnyProvider;
use repolens_llm::provider::LlmProvider;

use crate::error::{IndexError, Result};

/// One embedding model for both indexing and querying.
///
/// The indexer and the retriever hold the same `Arc<Embedder>`, so stored
/// vectors and question vectors always come from the same model.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<AnyProvider>,
    batch_size: usize,
}

impl Embedder {
    #[must_use]
    pub fn new(provider: Arc<AnyProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// # Errors
    ///
    /// Returns an error if the provider cannot embed.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.provider.embed(text).await?)
    }

    /// Embed `texts` in slices of `batch_size`, preserving order and length.
    ///
    /// # Errors
    ///
    /// Returns the first provider error, or `EmbeddingCount` if a slice comes
    /// back with the wrong number of vectors.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, slice) in texts.chunks(self.batch_size).enumerate() {
            let batch = self.provider.embed_batch(slice).await?;
            if batch.len() != slice.len() {
                return Err(IndexError::EmbeddingCount {
                    expected: slice.len(),
                    actual: batch.len(),
                });
            }
            tracing::debug!(batch = i, size = slice.len(), "embedded batch");
            vectors.extend(batch);
        }
        Ok(vectors)
    }

    /// Vector dimension reported by the model, learned from a probe embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe fails.
    pub async fn dimension(&self) -> Result<u64> {
        let probe = self.embed("probe").await?;
        Ok(u64::try_from(probe.len())?)
    }
}
