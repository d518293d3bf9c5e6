//! The pipeline context object.
//!
//! [`RagService`] owns every long-lived handle (embedding client, vector store, optional
//! generator, rule tables, metrics) and exposes the ingestion and query operations. It is built
//! once, from [`Config`] or from explicit [`RagParts`], and shared by reference.

use crate::config::{Config, ConfigError, ReingestPolicy, RetrievalModeKind, VectorStoreKind};
use crate::embedding::{EmbeddingClient, EmbeddingSetupError, build_embedding_client};
use crate::generation::{
    GenerationClient, GenerationClientError, GenerationPolicy, GenerationRequest,
    GenerationSetupError, build_generation_client, build_prompt,
};
use crate::http::build_client;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::processing::enrich::CATEGORY_KEY;
use crate::processing::{
    Chunk, ChunkingError, ChunkingPolicy, EnrichmentRules, IndexWriter, IngestError,
    IngestOutcome, MetadataEnricher, RulesError, Segmenter, load_corpus,
};
use crate::retrieval::{
    QueryClass, QueryClassifier, RetrievalError, RetrievalMode, RetrievalResult, Retriever,
};
use crate::store::{MemoryStore, QdrantStore, StoreError, VectorStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while assembling a [`RagService`] from configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration was missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Embedding client could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingSetupError),
    /// Generation client could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationSetupError),
    /// Vector store client could not be built.
    #[error("Failed to initialize vector store: {0}")]
    Store(#[from] StoreError),
    /// HTTP client for the vector store could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    /// Custom enrichment rules could not be loaded.
    #[error(transparent)]
    Rules(#[from] RulesError),
    /// Chunking overrides were inconsistent.
    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),
}

/// Failures raised by [`RagService::answer`].
#[derive(Debug, Error)]
pub enum AnswerError {
    /// No generation provider is configured.
    #[error("Answer generation is disabled (GENERATION_PROVIDER=none)")]
    GeneratorDisabled,
    /// Evidence retrieval failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// The generator failed.
    #[error(transparent)]
    Generation(#[from] GenerationClientError),
}

/// Health of the vector store as seen by the service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IndexStatus {
    /// True when the store answered a count request.
    pub available: bool,
    /// Number of stored chunks; zero when unavailable.
    pub document_count: usize,
    /// Reason the store is unavailable.
    pub error: Option<String>,
}

/// Generated answer plus the context it was produced from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Generated text.
    pub text: String,
    /// Class the query was assigned.
    pub class: QueryClass,
    /// Temperature used for generation.
    pub temperature: f32,
    /// Source files of the evidence, first occurrence wins.
    pub sources: Vec<String>,
}

/// Components a [`RagService`] is built from. Tests substitute any of them.
pub struct RagParts {
    /// Embedding provider.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector store.
    pub store: Arc<dyn VectorStore>,
    /// Answer generator; `None` disables [`RagService::answer`].
    pub generator: Option<Arc<dyn GenerationClient>>,
    /// Category and topic tagging.
    pub enricher: MetadataEnricher,
    /// Query intent classifier.
    pub classifier: QueryClassifier,
    /// Per-class generation settings.
    pub generation_policy: GenerationPolicy,
    /// Chunking policy used by [`RagService::bootstrap`] callers at startup.
    pub startup_policy: ChunkingPolicy,
    /// Evidence count used by [`RagService::answer`].
    pub retrieval_k: usize,
    /// Retrieval mode used by [`RagService::answer`].
    pub retrieval_mode: RetrievalMode,
    /// Behaviour for previously stored chunks of re-ingested files.
    pub reingest_policy: ReingestPolicy,
    /// Chunks embedded and upserted per batch.
    pub batch_size: usize,
    /// Expected embedding dimension, when known.
    pub embedding_dimension: Option<usize>,
}

impl RagParts {
    /// Parts with default rules and policies around the given services.
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            generator: None,
            enricher: MetadataEnricher::default(),
            classifier: QueryClassifier::default(),
            generation_policy: GenerationPolicy::default(),
            startup_policy: ChunkingPolicy::startup(),
            retrieval_k: 5,
            retrieval_mode: RetrievalMode::default(),
            reingest_policy: ReingestPolicy::default(),
            batch_size: crate::processing::writer::DEFAULT_BATCH_SIZE,
            embedding_dimension: None,
        }
    }
}

/// Ingestion and retrieval pipeline over one vector store.
pub struct RagService {
    store: Arc<dyn VectorStore>,
    generator: Option<Arc<dyn GenerationClient>>,
    writer: IndexWriter,
    retriever: Retriever,
    enricher: MetadataEnricher,
    classifier: QueryClassifier,
    generation_policy: GenerationPolicy,
    startup_policy: ChunkingPolicy,
    retrieval_k: usize,
    retrieval_mode: RetrievalMode,
    reingest_policy: ReingestPolicy,
    metrics: PipelineMetrics,
}

impl RagService {
    /// Assemble a service from explicit parts.
    pub fn new(parts: RagParts) -> Self {
        let mut writer = IndexWriter::new(
            Arc::clone(&parts.embedder),
            Arc::clone(&parts.store),
            parts.batch_size,
        );
        if let Some(dimension) = parts.embedding_dimension {
            writer = writer.with_dimension(dimension);
        }
        let retriever = Retriever::new(Arc::clone(&parts.embedder), Arc::clone(&parts.store));
        Self {
            store: parts.store,
            generator: parts.generator,
            writer,
            retriever,
            enricher: parts.enricher,
            classifier: parts.classifier,
            generation_policy: parts.generation_policy,
            startup_policy: parts.startup_policy,
            retrieval_k: parts.retrieval_k,
            retrieval_mode: parts.retrieval_mode,
            reingest_policy: parts.reingest_policy,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Build every component described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        tracing::info!("Initializing embedding client");
        let embedder = build_embedding_client(config)?;
        let generator = build_generation_client(config)?;

        let store: Arc<dyn VectorStore> = match config.vector_store {
            VectorStoreKind::Qdrant => {
                let http = build_client(
                    "folio-rag/qdrant",
                    Duration::from_secs(config.request_timeout_secs),
                )?;
                Arc::new(QdrantStore::new(
                    http,
                    &config.qdrant_url,
                    config.qdrant_api_key.clone(),
                    config.qdrant_collection_name.clone(),
                    config.embedding_dimension,
                )?)
            }
            VectorStoreKind::Memory => {
                tracing::warn!("Using the in-memory vector store; the index is lost on exit");
                Arc::new(MemoryStore::with_dimension(config.embedding_dimension))
            }
        };

        let rules = match &config.enrichment_rules_path {
            Some(path) => EnrichmentRules::from_path(path)?,
            None => EnrichmentRules::default(),
        };

        let startup_policy =
            match (config.text_splitter_chunk_size, config.text_splitter_chunk_overlap) {
                (None, None) => ChunkingPolicy::startup(),
                (size, overlap) => {
                    let preset = ChunkingPolicy::startup();
                    ChunkingPolicy::new(
                        size.unwrap_or(preset.chunk_size()),
                        overlap.unwrap_or(preset.chunk_overlap()),
                    )?
                }
            };

        let retrieval_mode = match config.retrieval_mode {
            RetrievalModeKind::Similarity => RetrievalMode::Similarity,
            RetrievalModeKind::Mmr => RetrievalMode::mmr(config.mmr_lambda, config.mmr_fetch_k),
        };

        Ok(Self::new(RagParts {
            embedder,
            store,
            generator,
            enricher: MetadataEnricher::new(rules),
            classifier: QueryClassifier::default(),
            generation_policy: GenerationPolicy::from_config(config),
            startup_policy,
            retrieval_k: config.retrieval_k,
            retrieval_mode,
            reingest_policy: config.reingest_policy,
            batch_size: config.upsert_batch_size,
            embedding_dimension: Some(config.embedding_dimension),
        }))
    }

    /// Chunking policy for startup ingestion, including configured overrides.
    pub fn startup_policy(&self) -> &ChunkingPolicy {
        &self.startup_policy
    }

    /// Configured evidence count and retrieval mode.
    pub fn retrieval_defaults(&self) -> (usize, RetrievalMode) {
        (self.retrieval_k, self.retrieval_mode)
    }

    /// Load, segment, enrich, and index every document below `root`.
    ///
    /// A missing `root` fails with [`IngestError::CorpusNotFound`] before the store is touched.
    /// An empty corpus is a successful run with `empty_corpus` set.
    pub async fn ingest(
        &self,
        root: &Path,
        policy: &ChunkingPolicy,
    ) -> Result<IngestOutcome, IngestError> {
        tracing::info!(
            root = %root.display(),
            chunk_size = policy.chunk_size(),
            chunk_overlap = policy.chunk_overlap(),
            reingest = ?self.reingest_policy,
            "Starting ingestion"
        );
        let report = load_corpus(root)?;
        let mut outcome = IngestOutcome {
            documents_loaded: report.documents.len(),
            load_failures: report.failures,
            ..IngestOutcome::default()
        };

        self.store.ensure_ready().await?;

        if report.documents.is_empty() {
            tracing::warn!(root = %root.display(), "Corpus contains no loadable documents");
            outcome.empty_corpus = true;
            self.record(&outcome);
            return Ok(outcome);
        }

        let segmenter = Segmenter::new(policy.clone());
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        for document in &report.documents {
            let segmented = segmenter.segment(document);
            if let Some(error) = segmented.fallback {
                outcome
                    .split_fallbacks
                    .push((document.source_path.clone(), error));
            }
            if let Some(name) = document.source_path.file_name() {
                let name = name.to_string_lossy().into_owned();
                if !sources.contains(&name) {
                    sources.push(name);
                }
            }
            for mut chunk in segmented.chunks {
                self.enricher
                    .enrich(&mut chunk.metadata, &document.source_path, &chunk.text);
                if let Some(category) = chunk.metadata.get(CATEGORY_KEY) {
                    *outcome.category_counts.entry(category.clone()).or_default() += 1;
                }
                chunks.push(chunk);
            }
        }

        if self.reingest_policy == ReingestPolicy::ReplaceBySource {
            for source in &sources {
                self.store.delete_by_source(source).await?;
                tracing::debug!(source = %source, "Removed previous chunks");
            }
            outcome.replaced_sources = sources;
        }

        let summary = self.writer.write(chunks).await?;
        outcome.chunks_processed = summary.written;
        self.record(&outcome);

        tracing::info!(
            documents = outcome.documents_loaded,
            chunks = outcome.chunks_processed,
            failures = outcome.load_failures.len(),
            fallbacks = outcome.split_fallbacks.len(),
            categories = ?outcome.category_counts,
            "Ingestion complete"
        );
        Ok(outcome)
    }

    /// Ingest `root` only when the store holds no chunks yet.
    pub async fn bootstrap(
        &self,
        root: &Path,
        policy: &ChunkingPolicy,
    ) -> Result<IngestOutcome, IngestError> {
        self.store.ensure_ready().await?;
        let existing = self.store.count().await?;
        if existing > 0 {
            tracing::info!(existing, "Store already populated; skipping startup ingestion");
            return Ok(IngestOutcome {
                skipped_existing: true,
                ..IngestOutcome::default()
            });
        }
        self.ingest(root, policy).await
    }

    /// Classify a query's intent.
    pub fn classify(&self, query: &str) -> QueryClass {
        self.classifier.classify(query)
    }

    /// Retrieve up to `k` pieces of evidence for `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        mode: RetrievalMode,
    ) -> Result<RetrievalResult, RetrievalError> {
        let result = self.retriever.retrieve(query, k, mode).await?;
        self.metrics.record_retrieval();
        Ok(result)
    }

    /// Report whether the store is reachable and how many chunks it holds. Never fails.
    pub async fn index_status(&self) -> IndexStatus {
        match self.store.count().await {
            Ok(document_count) => IndexStatus {
                available: true,
                document_count,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Vector store status probe failed");
                IndexStatus {
                    available: false,
                    document_count: 0,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Classify, retrieve with the configured defaults, and generate an answer.
    pub async fn answer(&self, query: &str) -> Result<Answer, AnswerError> {
        let generator = self.generator.as_ref().ok_or(AnswerError::GeneratorDisabled)?;
        let class = self.classify(query);
        let settings = self.generation_policy.settings(class);
        let retrieval = self
            .retrieve(query, self.retrieval_k, self.retrieval_mode)
            .await?;

        let prompt = build_prompt(query, &retrieval.evidence);
        tracing::debug!(
            class = %class,
            temperature = settings.temperature,
            evidence = retrieval.evidence.len(),
            "Generating answer"
        );
        let text = generator
            .generate(GenerationRequest {
                prompt,
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            })
            .await?;
        self.metrics.record_answer();

        Ok(Answer {
            text,
            class,
            temperature: settings.temperature,
            sources: retrieval.sources,
        })
    }

    /// Current pipeline counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn record(&self, outcome: &IngestOutcome) {
        self.metrics.record_ingest(
            outcome.documents_loaded as u64,
            outcome.chunks_processed as u64,
            outcome.load_failures.len() as u64,
        );
    }
}
