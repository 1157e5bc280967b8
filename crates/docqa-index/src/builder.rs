use docqa_llm::{LlmError, LlmProvider};

use crate::document::Chunk;
use crate::error::IndexError;
use crate::store::VectorIndex;

pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Embeds chunks and assembles them into a [`VectorIndex`].
pub struct IndexBuilder<'a, P: LlmProvider> {
    provider: &'a P,
    batch_size: usize,
}

impl<'a, P: LlmProvider> IndexBuilder<'a, P> {
    /// A `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(provider: &'a P, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed every chunk, in order, and return the populated index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyInput`] when `chunks` is empty, or the first
    /// embedding error. Nothing is written to disk here.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<VectorIndex, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        let model = self
            .provider
            .embedding_model()
            .ok_or_else(|| LlmError::EmbedUnsupported {
                provider: self.provider.name().to_owned(),
            })?;

        let total = chunks.len();
        let mut index: Option<VectorIndex> = None;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.provider.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(IndexError::InvalidVector(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                let target = index.get_or_insert_with(|| {
                    VectorIndex::new(self.provider.name(), model, vector.len())
                });
                target.insert(chunk.clone(), vector)?;
            }
            tracing::debug!(
                embedded = index.as_ref().map_or(0, VectorIndex::len),
                total,
                "embedding chunks"
            );
        }

        index.ok_or(IndexError::EmptyInput)
    }
}
