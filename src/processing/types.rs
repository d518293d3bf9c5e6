//! Core data types and error definitions for the ingestion pipeline.

use crate::embedding::EmbeddingClientError;
use crate::processing::loader::DocumentFormat;
use crate::store::StoreError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// String metadata attached to every chunk, ordered by key.
pub type ChunkMetadata = BTreeMap<String, String>;

/// A bounded segment of source text plus its metadata, the unit of retrieval.
///
/// Identifiers are assigned by the [`crate::processing::IndexWriter`] at write time, so a chunk
/// that has not been indexed carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Source attribution, enrichment tags, and header path.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk from text and metadata.
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Errors produced while validating a chunking policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The policy configured an impossible size budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
}

/// Markdown header splitting failed; the document is re-split as plain text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SplitError {
    /// A fenced code block was opened and never closed.
    #[error("unterminated code fence opened on line {line}")]
    UnterminatedCodeFence {
        /// 1-based line number of the opening fence.
        line: usize,
    },
}

/// A file of one format could not be loaded; it is skipped and the run continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to load {format} document {}: {message}", path.display())]
pub struct LoadError {
    /// Format whose loader failed.
    pub format: DocumentFormat,
    /// File that failed to load.
    pub path: PathBuf,
    /// Human-readable cause.
    pub message: String,
}

/// Failures raised by the index writer. Both variants abort the run.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding service failed for a batch.
    #[error("Failed to generate embeddings ({committed} chunks already committed): {source}")]
    Embedding {
        /// Chunks durably written before the failure.
        committed: usize,
        /// Underlying provider error.
        #[source]
        source: EmbeddingClientError,
    },
    /// Vector store rejected or could not receive a batch.
    #[error("Failed to write to vector store ({committed} chunks already committed): {source}")]
    Store {
        /// Chunks durably written before the failure.
        committed: usize,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// Fatal ingestion errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configured corpus directory does not exist.
    #[error("Corpus directory not found: {}", .0.display())]
    CorpusNotFound(PathBuf),
    /// The embedding service failed; `committed` chunks were written before it did.
    #[error("Embedding service error after {committed} committed chunks: {source}")]
    Embedding {
        /// Chunks durably written before the failure.
        committed: usize,
        /// Underlying provider error.
        #[source]
        source: EmbeddingClientError,
    },
    /// The vector store could not be reached or rejected a write.
    #[error("Vector store unavailable after {committed} committed chunks: {source}")]
    StoreUnavailable {
        /// Chunks durably written before the failure.
        committed: usize,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl From<IndexError> for IngestError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::Embedding { committed, source } => Self::Embedding { committed, source },
            IndexError::Store { committed, source } => Self::StoreUnavailable { committed, source },
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(source: StoreError) -> Self {
        Self::StoreUnavailable {
            committed: 0,
            source,
        }
    }
}

/// Result of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Chunks written to the vector store.
    pub chunks_processed: usize,
    /// Raw documents produced by the loader (PDF pages count individually).
    pub documents_loaded: usize,
    /// Chunk count per `category` value.
    pub category_counts: BTreeMap<String, usize>,
    /// True when the corpus directory held no loadable documents.
    pub empty_corpus: bool,
    /// Per-file load failures that were skipped.
    pub load_failures: Vec<LoadError>,
    /// Markdown documents that fell back to plain-text splitting.
    pub split_fallbacks: Vec<(PathBuf, SplitError)>,
    /// Source files whose previous chunks were removed before writing.
    pub replaced_sources: Vec<String>,
    /// True when the run was skipped because the store already held chunks.
    pub skipped_existing: bool,
}
