//! Embeds enriched chunks and appends them to the vector store.

use super::types::{Chunk, IndexError};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::store::payload::current_timestamp_rfc3339;
use crate::store::{PointInsert, VectorStore, build_payload};
use std::sync::Arc;
use uuid::Uuid;

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Ids written by one [`IndexWriter::write`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Number of chunks committed.
    pub written: usize,
    /// Fresh point ids in input order.
    pub ids: Vec<String>,
}

/// Append-only writer over an embedding client and a vector store.
///
/// Every chunk gets a fresh UUID v4; nothing is updated or deleted.
#[derive(Clone)]
pub struct IndexWriter {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    dimension: Option<usize>,
}

impl IndexWriter {
    /// Create a writer. A zero `batch_size` falls back to [`DEFAULT_BATCH_SIZE`].
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
            dimension: None,
        }
    }

    /// Reject embeddings whose length differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Embed and upsert `chunks` batch by batch.
    ///
    /// Errors carry the number of chunks committed by earlier batches; the failing batch itself
    /// is never partially upserted by this writer.
    pub async fn write(&self, chunks: Vec<Chunk>) -> Result<IndexSummary, IndexError> {
        let mut summary = IndexSummary::default();
        if chunks.is_empty() {
            return Ok(summary);
        }
        let ingested_at = current_timestamp_rfc3339();

        for batch in chunks.chunks(self.batch_size) {
            let committed = summary.written;
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self
                .embedder
                .generate_embeddings(texts)
                .await
                .and_then(|vectors| self.validate(batch.len(), vectors))
                .map_err(|source| IndexError::Embedding { committed, source })?;

            let points: Vec<PointInsert> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| PointInsert {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    payload: build_payload(&chunk.text, &chunk.metadata, &ingested_at),
                })
                .collect();
            let ids: Vec<String> = points.iter().map(|point| point.id.clone()).collect();

            let written = self
                .store
                .upsert(points)
                .await
                .map_err(|source| IndexError::Store { committed, source })?;
            tracing::debug!(batch = written, committed = committed + written, "Batch indexed");

            summary.written += written;
            summary.ids.extend(ids);
        }

        tracing::info!(chunks = summary.written, "Chunks indexed");
        Ok(summary)
    }

    fn validate(
        &self,
        expected: usize,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if vectors.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} embeddings, received {}",
                vectors.len()
            )));
        }
        if let Some(dimension) = self.dimension
            && let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension)
        {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected embedding dimension {dimension}, received {}",
                bad.len()
            )));
        }
        Ok(vectors)
    }
}
