//! Embedding client abstraction and provider adapters.
//!
//! The pipeline treats the embedding model as an opaque service. Adapters fail loudly: a
//! transport error, an error status, or a response with the wrong number of vectors becomes an
//! [`EmbeddingClientError`]; nothing here substitutes a zero vector.

use crate::config::{Config, ConfigError, EmbeddingProvider};
use crate::http::{build_client, format_endpoint};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or timed out.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider answered with a payload we could not interpret.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client for the configured provider.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingSetupError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAiEmbeddingClient::new(
            build_client("folio-rag/embed", timeout)?,
            config.openai_base_url.clone(),
            config.require_openai_key()?.to_string(),
            config.embedding_model.clone(),
        )),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            build_client("folio-rag/embed", timeout)?,
            config.ollama_url.clone(),
            config.embedding_model.clone(),
        )),
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(config.embedding_dimension)),
    };
    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Embedding client initialized"
    );
    Ok(client)
}

/// Errors raised while constructing an embedding client.
#[derive(Debug, Error)]
pub enum EmbeddingSetupError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

fn transport_error(provider: &str, error: reqwest::Error) -> EmbeddingClientError {
    if error.is_timeout() {
        EmbeddingClientError::Unavailable(format!("{provider} request timed out: {error}"))
    } else if error.is_connect() {
        EmbeddingClientError::Unavailable(format!("failed to reach {provider}: {error}"))
    } else {
        EmbeddingClientError::GenerationFailed(format!("{provider} request failed: {error}"))
    }
}

fn ensure_count(
    vectors: Vec<Vec<f32>>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if vectors.len() != expected {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} vectors, received {}",
            vectors.len()
        )));
    }
    if vectors.iter().any(|vector| vector.is_empty()) {
        return Err(EmbeddingClientError::InvalidResponse(
            "provider returned an empty vector".into(),
        ));
    }
    Ok(vectors)
}

/// OpenAI `/embeddings` adapter.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Create an adapter that posts to `{base_url}/embeddings`.
    pub fn new(http: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        tracing::debug!(model = %self.model, texts = expected, "Requesting OpenAI embeddings");

        let response = self
            .http
            .post(format_endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| transport_error("OpenAI", error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let mut body: OpenAiEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;
        body.data.sort_by_key(|item| item.index);
        ensure_count(
            body.data.into_iter().map(|item| item.embedding).collect(),
            expected,
        )
    }
}

/// Ollama `/api/embed` adapter.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create an adapter that posts to `{base_url}/api/embed`.
    pub fn new(http: Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        tracing::debug!(model = %self.model, texts = expected, "Requesting Ollama embeddings");

        let response = self
            .http
            .post(format_endpoint(&self.base_url, "api/embed"))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| transport_error("Ollama", error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;
        ensure_count(body.embeddings, expected)
    }
}

/// Deterministic embedding client that hashes bytes into a normalized vector.
///
/// Useful offline and in tests: identical text always maps to the identical vector, and texts
/// sharing byte patterns land close together under cosine similarity.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a hashing embedder producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        for (idx, byte) in text.bytes().enumerate() {
            let position = (idx + usize::from(byte)) % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.iter().any(|text| text.is_empty()) {
            return Err(EmbeddingClientError::GenerationFailed(
                "cannot embed empty text".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}
