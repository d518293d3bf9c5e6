//! Process-local vector store.
//!
//! Points live in a `tokio::sync::RwLock<Vec<_>>`: queries take a read lock and may run in
//! parallel, appends take the write lock briefly per batch, so readers observe either the state
//! before or after a batch and never a torn entry.

use crate::retrieval::cosine_similarity;
use crate::store::{
    VectorStore,
    payload::SOURCE_FILE_KEY,
    types::{PointInsert, ScoredPoint, StoreError},
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// In-memory vector store with brute-force cosine search.
#[derive(Default)]
pub struct MemoryStore {
    dimension: Option<usize>,
    points: RwLock<Vec<PointInsert>>,
}

impl MemoryStore {
    /// Create an empty store that accepts vectors of any (consistent) dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects vectors whose length differs from `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            points: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<PointInsert>) -> Result<usize, StoreError> {
        let mut guard = self.points.write().await;
        let expected = self
            .dimension
            .or_else(|| guard.first().map(|point| point.vector.len()))
            .or_else(|| points.first().map(|point| point.vector.len()));
        if let Some(expected) = expected
            && let Some(point) = points.iter().find(|p| p.vector.len() != expected)
        {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: point.vector.len(),
            });
        }

        let count = points.len();
        for point in points {
            match guard.iter_mut().find(|existing| existing.id == point.id) {
                Some(existing) => *existing = point,
                None => guard.push(point),
            }
        }
        Ok(count)
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let guard = self.points.read().await;
        let mut scored: Vec<ScoredPoint> = guard
            .iter()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(vector, &point.vector),
                payload: point.payload.clone(),
                vector: with_vectors.then(|| point.vector.clone()),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.points.read().await.len())
    }

    async fn delete_by_source(&self, source_file: &str) -> Result<(), StoreError> {
        let mut guard = self.points.write().await;
        guard.retain(|point| {
            !matches!(
                point.payload.get(SOURCE_FILE_KEY),
                Some(Value::String(source)) if source == source_file
            )
        });
        Ok(())
    }
}
