use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use folio_rag::config::{Config, VectorStoreKind};
use folio_rag::logging;
use folio_rag::processing::ChunkingPolicy;
use folio_rag::retrieval::retriever::{DEFAULT_FETCH_K, DEFAULT_LAMBDA};
use folio_rag::retrieval::{QueryClassifier, RetrievalMode, RetrievalResult};
use folio_rag::service::RagService;
use std::path::PathBuf;

/// Document ingestion and retrieval over a personal career corpus
#[derive(Parser)]
#[command(name = "folio-rag", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk, enrich, and index the corpus
    Ingest {
        /// Corpus directory (defaults to CORPUS_PATH)
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,
        /// Chunking policy to apply
        #[arg(long, value_enum, default_value_t = PolicyArg::Startup)]
        policy: PolicyArg,
        /// Only ingest when the store is empty
        #[arg(long)]
        if_empty: bool,
    },
    /// Print the intent class of a query
    Classify {
        /// Query text
        query: String,
    },
    /// Retrieve evidence for a query
    Retrieve {
        /// Query text
        query: String,
        /// Number of results (defaults to RETRIEVAL_K)
        #[arg(short)]
        k: Option<usize>,
        /// Ranking mode (defaults to RETRIEVAL_MODE)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// MMR relevance weight in [0, 1]
        #[arg(long)]
        lambda: Option<f32>,
        /// MMR candidate pool size
        #[arg(long)]
        fetch_k: Option<usize>,
    },
    /// Answer a question grounded in retrieved evidence
    Ask {
        /// Question text
        query: String,
    },
    /// Report vector store availability and chunk count
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// 400 characters, 100 overlap (or TEXT_SPLITTER_* overrides)
    Startup,
    /// 100 characters, 25 overlap
    OnDemand,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Similarity,
    Mmr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    if let Some(output) = run_offline(&cli.command) {
        println!("{output}");
        return Ok(());
    }
    let command = cli.command;

    let config = Config::load().context("failed to load configuration")?;
    let service = RagService::from_config(&config).context("failed to initialize pipeline")?;

    // The in-memory store starts empty in every process; index the corpus before querying it.
    let needs_bootstrap = config.vector_store == VectorStoreKind::Memory
        && matches!(command, Command::Retrieve { .. } | Command::Ask { .. });
    if needs_bootstrap {
        service
            .bootstrap(&config.corpus_path, service.startup_policy())
            .await
            .context("startup ingestion failed")?;
    }

    match command {
        Command::Ingest {
            path,
            policy,
            if_empty,
        } => {
            let root = path.unwrap_or_else(|| config.corpus_path.clone());
            let policy = match policy {
                PolicyArg::Startup => service.startup_policy().clone(),
                PolicyArg::OnDemand => ChunkingPolicy::on_demand(),
            };
            let result = if if_empty {
                service.bootstrap(&root, &policy).await
            } else {
                service.ingest(&root, &policy).await
            };
            let outcome = result.context("ingestion failed")?;

            if outcome.skipped_existing {
                println!("Store already populated; nothing ingested.");
                return Ok(());
            }
            println!(
                "Ingested {} chunks from {} documents.",
                outcome.chunks_processed, outcome.documents_loaded
            );
            for (category, count) in &outcome.category_counts {
                println!("  {category}: {count}");
            }
            for failure in &outcome.load_failures {
                println!("  skipped: {failure}");
            }
            for (path, error) in &outcome.split_fallbacks {
                println!("  plain-text fallback: {} ({error})", path.display());
            }
        }
        Command::Classify { .. } => {}
        Command::Retrieve {
            query,
            k,
            mode,
            lambda,
            fetch_k,
        } => {
            let (default_k, default_mode) = service.retrieval_defaults();
            let mode = resolve_mode(default_mode, mode, lambda, fetch_k);
            let result = service
                .retrieve(&query, k.unwrap_or(default_k), mode)
                .await
                .context("retrieval failed")?;
            println!("class: {}", service.classify(&query));
            print_result(&result);
        }
        Command::Ask { query } => {
            let answer = service.answer(&query).await.context("answer failed")?;
            println!("{}", answer.text);
            println!();
            println!(
                "class: {} (temperature {})",
                answer.class, answer.temperature
            );
            if !answer.sources.is_empty() {
                println!("sources: {}", answer.sources.join(", "));
            }
        }
        Command::Status => {
            let status = service.index_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    tracing::debug!(metrics = ?service.metrics_snapshot(), "Exiting");
    Ok(())
}

/// Commands answered without configuration or provider clients.
fn run_offline(command: &Command) -> Option<String> {
    match command {
        Command::Classify { query } => Some(QueryClassifier::default().classify(query).to_string()),
        _ => None,
    }
}

fn resolve_mode(
    default: RetrievalMode,
    requested: Option<ModeArg>,
    lambda: Option<f32>,
    fetch_k: Option<usize>,
) -> RetrievalMode {
    let (default_lambda, default_fetch_k) = match default {
        RetrievalMode::Mmr { lambda, fetch_k } => (lambda, fetch_k),
        RetrievalMode::Similarity => (DEFAULT_LAMBDA, DEFAULT_FETCH_K),
    };
    let mmr = || {
        RetrievalMode::mmr(
            lambda.unwrap_or(default_lambda),
            fetch_k.unwrap_or(default_fetch_k),
        )
    };
    match requested {
        Some(ModeArg::Similarity) => RetrievalMode::Similarity,
        Some(ModeArg::Mmr) => mmr(),
        None if lambda.is_some() || fetch_k.is_some() => mmr(),
        None => default,
    }
}

fn print_result(result: &RetrievalResult) {
    for (rank, evidence) in result.evidence.iter().enumerate() {
        let source = evidence
            .metadata
            .get("source_file")
            .map(String::as_str)
            .unwrap_or("unknown");
        println!(
            "{}. [{source}] score={:.3}\n{}\n",
            rank + 1,
            evidence.score,
            evidence.text
        );
    }
    println!("sources: {}", result.sources.join(", "));
}
