//! Vector store capability and its backends.
//!
//! The pipeline needs four things from a store: append points, run a k-nearest-neighbour query
//! with scores, count entries, and (for replace-by-source re-ingestion) drop the points of one
//! source file. Qdrant provides them over HTTP; [`MemoryStore`] provides them in-process.

pub mod memory;
pub mod payload;
pub mod qdrant;
pub mod types;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use payload::{build_payload, compute_chunk_hash, split_payload};
pub use qdrant::QdrantStore;
pub use types::{PointInsert, ScoredPoint, StoreError};

/// Storage backend holding the indexed corpus.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Make sure the backing collection exists and is ready for writes.
    async fn ensure_ready(&self) -> Result<(), StoreError>;

    /// Insert or replace points keyed by id, returning how many were written.
    async fn upsert(&self, points: Vec<PointInsert>) -> Result<usize, StoreError>;

    /// Return up to `limit` points ordered by descending cosine similarity to `vector`.
    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Number of points currently stored.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Remove every point whose `source_file` payload equals `source_file`.
    async fn delete_by_source(&self, source_file: &str) -> Result<(), StoreError>;
}
