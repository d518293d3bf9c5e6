//! Query-time evidence retrieval.

use super::mmr::{self, Candidate};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::processing::ChunkMetadata;
use crate::store::payload::SOURCE_FILE_KEY;
use crate::store::{ScoredPoint, StoreError, VectorStore, split_payload};
use std::sync::Arc;
use thiserror::Error;

/// Default MMR relevance/diversity balance.
pub const DEFAULT_LAMBDA: f32 = 0.5;
/// Default MMR candidate pool size.
pub const DEFAULT_FETCH_K: usize = 20;

/// How candidates are ranked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalMode {
    /// Plain top-k by similarity.
    Similarity,
    /// Maximal Marginal Relevance over the top `fetch_k` neighbours.
    Mmr {
        /// Relevance weight in `[0, 1]`.
        lambda: f32,
        /// Candidate pool size, at least `k`.
        fetch_k: usize,
    },
}

impl Default for RetrievalMode {
    fn default() -> Self {
        Self::mmr(DEFAULT_LAMBDA, DEFAULT_FETCH_K)
    }
}

impl RetrievalMode {
    /// MMR mode with `lambda` clamped to `[0, 1]`. A NaN lambda becomes the default.
    pub fn mmr(lambda: f32, fetch_k: usize) -> Self {
        let lambda = if lambda.is_nan() {
            DEFAULT_LAMBDA
        } else {
            lambda.clamp(0.0, 1.0)
        };
        Self::Mmr { lambda, fetch_k }
    }

    /// Normalise against `k`: `fetch_k` is raised to at least `k`.
    pub fn for_k(self, k: usize) -> Self {
        match self {
            Self::Similarity => Self::Similarity,
            Self::Mmr { lambda, fetch_k } => Self::Mmr {
                lambda,
                fetch_k: fetch_k.max(k),
            },
        }
    }
}

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Point id in the store.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Chunk metadata, including `source_file`.
    pub metadata: ChunkMetadata,
    /// Similarity to the query reported by the store.
    pub score: f32,
}

/// Ranked evidence plus de-duplicated source attribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    /// Evidence in selection order.
    pub evidence: Vec<Evidence>,
    /// `source_file` values of `evidence`, first occurrence wins.
    pub sources: Vec<String>,
}

impl RetrievalResult {
    fn from_evidence(evidence: Vec<Evidence>) -> Self {
        let mut sources: Vec<String> = Vec::new();
        for item in &evidence {
            if let Some(source) = item.metadata.get(SOURCE_FILE_KEY)
                && !sources.contains(source)
            {
                sources.push(source.clone());
            }
        }
        Self { evidence, sources }
    }
}

/// Failures raised while retrieving evidence.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Query could not be embedded.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Store could not be queried.
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    /// Provider returned no vector for the query.
    #[error("Embedding provider returned no vector for the query")]
    EmptyEmbedding,
}

/// Embeds queries and ranks stored chunks. Read-only; safe to share across tasks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Build a retriever over an embedding client and a store.
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Return at most `k` pieces of evidence for `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        mode: RetrievalMode,
    ) -> Result<RetrievalResult, RetrievalError> {
        if k == 0 {
            return Ok(RetrievalResult::default());
        }
        let vector = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or(RetrievalError::EmptyEmbedding)?;

        let points = match mode.for_k(k) {
            RetrievalMode::Similarity => {
                let mut points = self.store.query(&vector, k, false).await?;
                points.truncate(k);
                points
            }
            RetrievalMode::Mmr { lambda, fetch_k } => {
                let pool = self.store.query(&vector, fetch_k, true).await?;
                rerank(pool, k, lambda)
            }
        };
        tracing::debug!(k, mode = ?mode, returned = points.len(), "Retrieved evidence");

        let evidence = points
            .into_iter()
            .map(|point| {
                let (text, metadata) = split_payload(point.payload);
                Evidence {
                    id: point.id,
                    text,
                    metadata,
                    score: point.score,
                }
            })
            .collect();
        Ok(RetrievalResult::from_evidence(evidence))
    }
}

fn rerank(pool: Vec<ScoredPoint>, k: usize, lambda: f32) -> Vec<ScoredPoint> {
    let order = {
        let candidates: Vec<Candidate<'_>> = pool
            .iter()
            .map(|point| Candidate {
                relevance: point.score,
                vector: point.vector.as_deref().unwrap_or(&[]),
            })
            .collect();
        mmr::select(&candidates, k, lambda)
    };
    let mut slots: Vec<Option<ScoredPoint>> = pool.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots.get_mut(index).and_then(Option::take))
        .collect()
}
