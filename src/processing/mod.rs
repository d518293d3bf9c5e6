//! Ingestion pipeline: loading, segmentation, enrichment, and index writes.

pub mod chunking;
pub mod enrich;
pub mod loader;
pub mod markdown;
pub mod segmenter;
pub mod types;
pub mod writer;

pub use chunking::{ChunkingPolicy, RecursiveSplitter};
pub use enrich::{EnrichmentRules, MetadataEnricher, RulesError};
pub use loader::{DocumentFormat, LoadReport, RawDocument, load_corpus};
pub use markdown::{HeaderSection, MarkdownHeaderSplitter};
pub use segmenter::{SegmentStrategy, Segmented, Segmenter};
pub use types::{
    Chunk, ChunkMetadata, ChunkingError, IndexError, IngestError, IngestOutcome, LoadError,
    SplitError,
};
pub use writer::{IndexSummary, IndexWriter};
