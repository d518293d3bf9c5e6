use std::{env, sync::Once};

use folio_rag::config::Config;
use folio_rag::embedding::build_embedding_client;
use folio_rag::processing::ChunkingPolicy;
use folio_rag::retrieval::RetrievalMode;
use folio_rag::service::RagService;

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn live_config() -> Config {
    INIT.call_once(|| {
        set_default_env("VECTOR_STORE", "qdrant");
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION_NAME", "folio-live");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        set_default_env("GENERATION_PROVIDER", "none");
    });
    Config::from_env().expect("live configuration")
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_status() {
    let config = live_config();
    let service = RagService::from_config(&config).expect("service");
    let status = service.index_status().await;
    assert!(status.available, "Qdrant should be reachable: {status:?}");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = live_config();
    let client = build_embedding_client(&config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["folio live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Qdrant and Ollama"]
async fn live_ingest_and_retrieve() {
    let config = live_config();
    let service = RagService::from_config(&config).expect("service");
    let corpus = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        corpus.path().join("skills.md"),
        "## Languages\nRust, Python, and TypeScript.\n\n## Frameworks\nAxum, FastAPI, and React.",
    )
    .expect("write corpus");

    let outcome = service
        .ingest(corpus.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert_eq!(outcome.chunks_processed, 2);

    let result = service
        .retrieve("which frameworks", 2, RetrievalMode::mmr(0.5, 10))
        .await
        .expect("retrieve");
    assert!(!result.evidence.is_empty());
    assert!(result.sources.iter().any(|source| source == "skills.md"));
}
