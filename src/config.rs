use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion and retrieval pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory scanned for PDF, text, and Markdown documents.
    pub corpus_path: PathBuf,
    /// Vector store backend used for the indexed corpus.
    pub vector_store: VectorStoreKind,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection holding corpus chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// API key for OpenAI-compatible embedding and generation endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Generative backend used to answer questions.
    pub generation_provider: GenerationProvider,
    /// Model identifier used for answer generation.
    pub generation_model: String,
    /// Upper bound on generated tokens per answer.
    pub generation_max_tokens: u32,
    /// Sampling temperature for factual questions.
    pub temperature_factual: f32,
    /// Sampling temperature for conversational questions.
    pub temperature_conversational: f32,
    /// Sampling temperature for creative requests.
    pub temperature_creative: f32,
    /// Optional override for the startup chunk size (characters).
    pub text_splitter_chunk_size: Option<usize>,
    /// Optional override for the startup chunk overlap (characters).
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Default number of evidence chunks returned per query.
    pub retrieval_k: usize,
    /// Default retrieval strategy.
    pub retrieval_mode: RetrievalModeKind,
    /// Relevance/diversity balance used by MMR retrieval.
    pub mmr_lambda: f32,
    /// Candidate pool size fetched before MMR reranking.
    pub mmr_fetch_k: usize,
    /// Timeout applied to every outbound HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Number of chunks embedded and upserted per batch.
    pub upsert_batch_size: usize,
    /// Behaviour when a corpus is ingested into a non-empty store.
    pub reingest_policy: ReingestPolicy,
    /// Optional JSON file replacing the built-in category and topic tables.
    pub enrichment_rules_path: Option<PathBuf>,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Remote Qdrant collection.
    Qdrant,
    /// Process-local store, emptied on exit.
    Memory,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic byte-hashing embedder for offline runs and tests.
    Hash,
}

/// Supported answer generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Hosted OpenAI chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Retrieval only; `answer` is unavailable.
    None,
}

/// Retrieval strategy selected through configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalModeKind {
    /// Plain top-k similarity.
    Similarity,
    /// Maximal Marginal Relevance reranking.
    Mmr,
}

/// What happens to previously stored chunks of a source file on re-ingestion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Keep prior chunks; re-ingesting duplicates content.
    #[default]
    Append,
    /// Delete stored chunks of every source file present in the new run first.
    #[serde(rename = "replace")]
    ReplaceBySource,
}

impl Config {
    /// Load a `.env` file when present, then read configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            corpus = %config.corpus_path.display(),
            vector_store = ?config.vector_store,
            qdrant_url = %config.qdrant_url,
            collection = %config.qdrant_collection_name,
            embedding_provider = ?config.embedding_provider,
            generation_provider = ?config.generation_provider,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Read configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            corpus_path: PathBuf::from(env_or("CORPUS_PATH", "data")),
            vector_store: parse_or("VECTOR_STORE", VectorStoreKind::Qdrant)?,
            qdrant_url: env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            qdrant_collection_name: env_or("QDRANT_COLLECTION_NAME", "folio"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::OpenAI)?,
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-large"),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 3072)?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            ollama_url: env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            generation_provider: parse_or("GENERATION_PROVIDER", GenerationProvider::OpenAI)?,
            generation_model: env_or("GENERATION_MODEL", "gpt-4o-mini"),
            generation_max_tokens: parse_or("GENERATION_MAX_TOKENS", 512)?,
            temperature_factual: parse_or("TEMPERATURE_FACTUAL", 0.2)?,
            temperature_conversational: parse_or("TEMPERATURE_CONVERSATIONAL", 0.5)?,
            temperature_creative: parse_or("TEMPERATURE_CREATIVE", 0.8)?,
            text_splitter_chunk_size: parse_optional("TEXT_SPLITTER_CHUNK_SIZE")?,
            text_splitter_chunk_overlap: parse_optional("TEXT_SPLITTER_CHUNK_OVERLAP")?,
            retrieval_k: parse_or("RETRIEVAL_K", 5)?,
            retrieval_mode: parse_or("RETRIEVAL_MODE", RetrievalModeKind::Mmr)?,
            mmr_lambda: parse_or("MMR_LAMBDA", 0.5)?,
            mmr_fetch_k: parse_or("MMR_FETCH_K", 20)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            upsert_batch_size: parse_or("UPSERT_BATCH_SIZE", 64)?,
            reingest_policy: parse_or("REINGEST_POLICY", ReingestPolicy::Append)?,
            enrichment_rules_path: load_env_optional("ENRICHMENT_RULES_PATH").map(PathBuf::from),
        })
    }

    /// Fetch the OpenAI API key, failing when an OpenAI-backed component needs it.
    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("OPENAI_API_KEY".to_string()))
    }
}

fn env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl FromStr for VectorStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "none" | "off" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

impl FromStr for RetrievalModeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "similarity" | "top-k" | "topk" => Ok(Self::Similarity),
            "mmr" => Ok(Self::Mmr),
            _ => Err(()),
        }
    }
}

impl FromStr for ReingestPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "replace" | "replace-by-source" => Ok(Self::ReplaceBySource),
            _ => Err(()),
        }
    }
}
