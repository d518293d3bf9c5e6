use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use folio_rag::config::ReingestPolicy;
use folio_rag::embedding::{EmbeddingClient, EmbeddingClientError, HashEmbeddingClient};
use folio_rag::processing::{ChunkingPolicy, IngestError, SplitError};
use folio_rag::retrieval::{QueryClass, RetrievalError, RetrievalMode, RetrievalResult};
use folio_rag::service::{RagParts, RagService};
use folio_rag::store::{MemoryStore, QdrantStore, StoreError, VectorStore};
use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use serde_json::json;
use tempfile::{TempDir, tempdir};

const DIMENSION: usize = 32;

fn service_with(policy: ReingestPolicy) -> (RagService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_dimension(DIMENSION));
    let mut parts = RagParts::new(Arc::new(HashEmbeddingClient::new(DIMENSION)), store.clone());
    parts.reingest_policy = policy;
    parts.embedding_dimension = Some(DIMENSION);
    (RagService::new(parts), store)
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("write corpus file");
}

fn career_corpus() -> TempDir {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "projects.md",
        "## Folio\nA portfolio chatbot built with FastAPI and React.\n\n\
         ## Pipelines\nBatch ETL jobs in Spark and SQL.",
    );
    write(
        dir.path(),
        "experience.txt",
        "Diego used Django and Flask at his first job.\n\n\
         Later he led a team shipping Rust services with Axum and Tokio.",
    );
    write(
        dir.path(),
        "education.md",
        "# Education\nBachelor in computer science, with a course on machine learning.",
    );
    dir
}

fn ids(result: &RetrievalResult) -> Vec<String> {
    result.evidence.iter().map(|item| item.id.clone()).collect()
}

#[tokio::test]
async fn markdown_with_two_sections_yields_two_enriched_chunks() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "projects.md",
        "## Folio\nA portfolio chatbot built with FastAPI and React.\n\n\
         ## Pipelines\nBatch ETL jobs in Spark and SQL.",
    );
    let (service, store) = service_with(ReingestPolicy::Append);

    let outcome = service
        .ingest(dir.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert_eq!(outcome.chunks_processed, 2);
    assert_eq!(outcome.documents_loaded, 1);
    assert_eq!(outcome.category_counts.get("projects"), Some(&2));
    assert_eq!(store.count().await.expect("count"), 2);

    let result = service
        .retrieve(
            "## Pipelines\nBatch ETL jobs in Spark and SQL.",
            1,
            RetrievalMode::Similarity,
        )
        .await
        .expect("retrieve");
    let top = &result.evidence[0];
    assert_eq!(top.metadata["category"], "projects");
    assert_eq!(top.metadata["topics"], "data");
    assert_eq!(top.metadata["Header 2"], "Pipelines");
    assert_eq!(top.metadata["source_file"], "projects.md");
    assert_eq!(result.sources, vec!["projects.md".to_string()]);
}

#[tokio::test]
async fn nonexistent_corpus_fails_without_touching_store() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing");
    let (service, store) = service_with(ReingestPolicy::Append);

    let error = service
        .ingest(&missing, &ChunkingPolicy::startup())
        .await
        .expect_err("missing corpus");
    assert!(matches!(error, IngestError::CorpusNotFound(path) if path == missing));
    assert_eq!(store.count().await.expect("count"), 0);
    assert_eq!(service.metrics_snapshot().ingest_runs, 0);
}

#[tokio::test]
async fn empty_corpus_is_reported_not_failed() {
    let dir = tempdir().expect("tempdir");
    let (service, store) = service_with(ReingestPolicy::Append);
    let outcome = service
        .ingest(dir.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert!(outcome.empty_corpus);
    assert_eq!(outcome.chunks_processed, 0);
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn factual_query_retrieves_bounded_evidence_with_unique_sources() {
    let corpus = career_corpus();
    let (service, _store) = service_with(ReingestPolicy::Append);
    service
        .ingest(corpus.path(), &ChunkingPolicy::on_demand())
        .await
        .expect("ingest");

    let query = "what frameworks has Diego used";
    assert_eq!(service.classify(query), QueryClass::Factual);

    let result = service
        .retrieve(query, 4, RetrievalMode::mmr(0.5, 20))
        .await
        .expect("retrieve");
    assert!(!result.evidence.is_empty());
    assert!(result.evidence.len() <= 4);
    let unique: BTreeSet<_> = result.sources.iter().collect();
    assert_eq!(unique.len(), result.sources.len());
    for item in &result.evidence {
        assert!(result.sources.contains(&item.metadata["source_file"]));
    }
    assert_eq!(service.metrics_snapshot().retrievals, 1);
}

#[tokio::test]
async fn mmr_with_full_relevance_matches_similarity() {
    let corpus = career_corpus();
    let (service, _store) = service_with(ReingestPolicy::Append);
    service
        .ingest(corpus.path(), &ChunkingPolicy::on_demand())
        .await
        .expect("ingest");

    let query = "Rust services and data pipelines";
    let plain = service
        .retrieve(query, 3, RetrievalMode::Similarity)
        .await
        .expect("similarity");
    let mmr = service
        .retrieve(query, 3, RetrievalMode::mmr(1.0, 10))
        .await
        .expect("mmr");
    assert_eq!(ids(&plain), ids(&mmr));
}

#[tokio::test]
async fn mmr_pool_equal_to_k_returns_top_k_for_any_lambda() {
    let corpus = career_corpus();
    let (service, _store) = service_with(ReingestPolicy::Append);
    service
        .ingest(corpus.path(), &ChunkingPolicy::on_demand())
        .await
        .expect("ingest");

    let query = "machine learning course";
    let plain: BTreeSet<String> = ids(
        &service
            .retrieve(query, 3, RetrievalMode::Similarity)
            .await
            .expect("similarity"),
    )
    .into_iter()
    .collect();

    for lambda in [0.0, 0.3, 0.7] {
        let diverse: BTreeSet<String> = ids(
            &service
                .retrieve(query, 3, RetrievalMode::mmr(lambda, 3))
                .await
                .expect("mmr"),
        )
        .into_iter()
        .collect();
        assert_eq!(plain, diverse, "lambda {lambda}");
    }
}

#[tokio::test]
async fn append_reingestion_duplicates_content() {
    let corpus = career_corpus();
    let (service, store) = service_with(ReingestPolicy::Append);
    let policy = ChunkingPolicy::startup();

    let first = service.ingest(corpus.path(), &policy).await.expect("first");
    let after_first = store.count().await.expect("count");
    assert_eq!(after_first, first.chunks_processed);

    let second = service.ingest(corpus.path(), &policy).await.expect("second");
    assert!(second.replaced_sources.is_empty());
    assert_eq!(store.count().await.expect("count"), after_first * 2);
}

#[tokio::test]
async fn replace_by_source_reingestion_keeps_count_stable() {
    let corpus = career_corpus();
    let (service, store) = service_with(ReingestPolicy::ReplaceBySource);
    let policy = ChunkingPolicy::startup();

    service.ingest(corpus.path(), &policy).await.expect("first");
    let after_first = store.count().await.expect("count");

    let second = service.ingest(corpus.path(), &policy).await.expect("second");
    assert_eq!(store.count().await.expect("count"), after_first);
    assert_eq!(second.replaced_sources.len(), 3);
    assert!(second.replaced_sources.contains(&"projects.md".to_string()));
}

#[tokio::test]
async fn bootstrap_skips_populated_store() {
    let corpus = career_corpus();
    let (service, store) = service_with(ReingestPolicy::Append);
    let policy = ChunkingPolicy::startup();

    let first = service.bootstrap(corpus.path(), &policy).await.expect("first");
    assert!(!first.skipped_existing);
    let count = store.count().await.expect("count");
    assert!(count > 0);

    let second = service.bootstrap(corpus.path(), &policy).await.expect("second");
    assert!(second.skipped_existing);
    assert_eq!(store.count().await.expect("count"), count);
}

#[tokio::test]
async fn unterminated_fence_falls_back_and_is_reported() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "notes.md", "## Snippet\n```rust\nfn main() {}\n");
    let (service, store) = service_with(ReingestPolicy::Append);

    let outcome = service
        .ingest(dir.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert_eq!(outcome.split_fallbacks.len(), 1);
    assert_eq!(
        outcome.split_fallbacks[0].1,
        SplitError::UnterminatedCodeFence { line: 2 }
    );
    assert_eq!(outcome.chunks_processed, 1);
    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn unreadable_files_are_skipped_and_counted() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "resume.pdf", "definitely not a pdf");
    write(dir.path(), "about.md", "I build Rust tools.");
    let (service, _store) = service_with(ReingestPolicy::Append);

    let outcome = service
        .ingest(dir.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert_eq!(outcome.load_failures.len(), 1);
    assert_eq!(outcome.chunks_processed, 1);
    assert_eq!(outcome.category_counts.get("about"), Some(&1));
    assert_eq!(service.metrics_snapshot().load_failures, 1);
}

struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingClient for UnavailableEmbedder {
    async fn generate_embeddings(
        &self,
        _texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Err(EmbeddingClientError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn embedding_outage_aborts_ingestion() {
    let corpus = career_corpus();
    let store = Arc::new(MemoryStore::new());
    let service = RagService::new(RagParts::new(Arc::new(UnavailableEmbedder), store.clone()));

    let error = service
        .ingest(corpus.path(), &ChunkingPolicy::startup())
        .await
        .expect_err("embedding outage");
    assert!(matches!(error, IngestError::Embedding { committed: 0, .. }));
    assert_eq!(store.count().await.expect("count"), 0);
}

fn qdrant_service(url: &str) -> RagService {
    let store = QdrantStore::new(reqwest::Client::new(), url, None, "folio".into(), DIMENSION)
        .expect("store");
    RagService::new(RagParts::new(
        Arc::new(HashEmbeddingClient::new(DIMENSION)),
        Arc::new(store),
    ))
}

#[tokio::test]
async fn index_status_reports_unreachable_store() {
    let service = qdrant_service("http://127.0.0.1:9");

    let status = service.index_status().await;
    assert!(!status.available);
    assert_eq!(status.document_count, 0);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn retrieve_fails_when_store_is_unreachable() {
    let service = qdrant_service("http://127.0.0.1:9");

    let error = service
        .retrieve("which frameworks", 3, RetrievalMode::Similarity)
        .await
        .expect_err("unreachable store");
    assert!(matches!(
        error,
        RetrievalError::StoreUnavailable(StoreError::Unavailable(_))
    ));
    assert_eq!(service.metrics_snapshot().retrievals, 0);
}

#[tokio::test]
async fn fresh_qdrant_is_available_and_empty() {
    let server = MockServer::start_async().await;
    let missing = json!({ "status": { "error": "Not found: Collection `folio` doesn't exist!" } });
    server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/folio");
            then.status(404).json_body(missing.clone());
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/folio");
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/folio/index");
            then.status(200).json_body(json!({ "result": {} }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/folio/points/count");
            then.status(404).json_body(missing.clone());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/folio/points/query");
            then.status(404).json_body(missing.clone());
        })
        .await;
    let service = qdrant_service(&server.base_url());

    let status = service.index_status().await;
    assert!(status.available, "fresh collection is reachable: {status:?}");
    assert_eq!(status.document_count, 0);

    let result = service
        .retrieve("which frameworks", 3, RetrievalMode::mmr(0.5, 10))
        .await
        .expect("retrieve");
    assert!(result.evidence.is_empty());
    assert!(result.sources.is_empty());

    let corpus = tempdir().expect("tempdir");
    let outcome = service
        .ingest(corpus.path(), &ChunkingPolicy::startup())
        .await
        .expect("ingest");
    assert!(outcome.empty_corpus);
    create.assert();
}
