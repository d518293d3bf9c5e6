//! Answer generation: prompt assembly, per-class generation policy, and provider adapters.
//!
//! Generation is optional. With `GENERATION_PROVIDER=none` no client is built and
//! [`crate::service::RagService::answer`] reports the generator as disabled; ingestion and
//! retrieval keep working.

use crate::config::{Config, ConfigError, GenerationProvider};
use crate::http::{build_client, format_endpoint};
use crate::retrieval::{Evidence, QueryClass};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by generation providers.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached or timed out.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request passed to a generation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Interface implemented by answer generators.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Sampling settings chosen for a query class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Maps each [`QueryClass`] to generation settings.
///
/// Factual queries sample coldest and creative ones hottest; the values come from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPolicy {
    factual: f32,
    conversational: f32,
    creative: f32,
    max_tokens: u32,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self::new(0.2, 0.5, 0.8, 512)
    }
}

impl GenerationPolicy {
    /// Build a policy from explicit per-class temperatures.
    pub fn new(factual: f32, conversational: f32, creative: f32, max_tokens: u32) -> Self {
        Self {
            factual,
            conversational,
            creative,
            max_tokens,
        }
    }

    /// Policy described by the configuration temperatures.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.temperature_factual,
            config.temperature_conversational,
            config.temperature_creative,
            config.generation_max_tokens,
        )
    }

    /// Settings for `class`.
    pub fn settings(&self, class: QueryClass) -> GenerationSettings {
        let temperature = match class {
            QueryClass::Factual => self.factual,
            QueryClass::Conversational => self.conversational,
            QueryClass::Creative => self.creative,
        };
        GenerationSettings {
            temperature,
            max_tokens: self.max_tokens,
        }
    }
}

const PROMPT_PREAMBLE: &str = "\
You are Diego Beuk's Career Scout & Talent Curator. You represent Diego with authenticity and \
strategic storytelling, presenting his career, achievements, and skills in a way that inspires \
confidence, curiosity, and opportunity.

Your style is innovative, engaging, informative, personable, data-informed, and persuasive, \
blending career marketing with technical insight.

Represent Diego positively but objectively: no exaggerations, only confident truths. Use vivid, \
natural, to-the-point language to highlight achievements and growth, and align his experience \
with employer needs.

Answer based solely on the knowledge provided below. Do not mention that you were given \
knowledge.

";

/// Assemble the answer prompt from a question and its evidence.
///
/// Evidence texts are concatenated in retrieval order, each followed by a blank line. The
/// question is inserted as-is; placeholder-like text inside it is never expanded.
pub fn build_prompt(question: &str, evidence: &[Evidence]) -> String {
    let knowledge: String = evidence
        .iter()
        .map(|item| format!("{}\n\n", item.text))
        .collect();
    format!(
        "{PROMPT_PREAMBLE}The question: {question}\n\nThe knowledge about Diego Beuk: {knowledge}"
    )
}

/// Errors raised while constructing a generation client.
#[derive(Debug, Error)]
pub enum GenerationSetupError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Build a generation client for the configured provider, or `None` when generation is off.
pub fn build_generation_client(
    config: &Config,
) -> Result<Option<Arc<dyn GenerationClient>>, GenerationSetupError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client: Arc<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::None => {
            tracing::info!("Generation disabled");
            return Ok(None);
        }
        GenerationProvider::OpenAI => Arc::new(OpenAiGenerationClient::new(
            build_client("folio-rag/generate", timeout)?,
            config.openai_base_url.clone(),
            config.require_openai_key()?.to_string(),
            config.generation_model.clone(),
        )),
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient::new(
            build_client("folio-rag/generate", timeout)?,
            config.ollama_url.clone(),
            config.generation_model.clone(),
        )),
    };
    tracing::info!(
        provider = ?config.generation_provider,
        model = %config.generation_model,
        "Generation client initialized"
    );
    Ok(Some(client))
}

fn transport_error(provider: &str, error: reqwest::Error) -> GenerationClientError {
    if error.is_timeout() {
        GenerationClientError::ProviderUnavailable(format!("{provider} request timed out: {error}"))
    } else {
        GenerationClientError::ProviderUnavailable(format!("failed to reach {provider}: {error}"))
    }
}

/// OpenAI chat completions adapter.
pub struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerationClient {
    /// Create an adapter that posts to `{base_url}/chat/completions`.
    pub fn new(http: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(format_endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_error("OpenAI", error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("OpenAI response had no content".into())
            })
    }
}

/// Ollama `/api/generate` adapter.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationClient {
    /// Create an adapter that posts to `{base_url}/api/generate`.
    pub fn new(http: Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let endpoint = format_endpoint(&self.base_url, "api/generate");
        let payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_error("Ollama", error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {endpoint} returned 404"
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
