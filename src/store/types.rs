//! Shared types used by the vector store backends.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with a vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// Store could not be reached (connection refused, DNS, timeout).
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    /// Store responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Store answered with a body we could not decode.
    #[error("Malformed vector store response: {0}")]
    InvalidResponse(String),
    /// A vector did not match the dimension the store was created with.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the store expects.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

/// Point ready for upsert: identifier, embedding, and the payload stored beside it.
#[derive(Debug, Clone)]
pub struct PointInsert {
    /// Unique identifier (UUID string).
    pub id: String,
    /// Embedding vector produced for the chunk text.
    pub vector: Vec<f32>,
    /// Payload holding chunk text and metadata.
    pub payload: Map<String, Value>,
}

/// Scored payload returned by nearest-neighbour queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// Payload associated with the vector.
    pub payload: Map<String, Value>,
    /// Stored vector, present when the query asked for vectors.
    pub vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) vector: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct CountResponse {
    pub(crate) result: CountResult,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: usize,
}
