//! Tracing setup for the CLI.
//!
//! Human-readable events go to stderr so command output on stdout stays pipeable. A second,
//! ANSI-free copy is written through a non-blocking appender to `logs/folio-rag.log`, or to the
//! path in `FOLIO_RAG_LOG_FILE`. Setting that variable to `off` disables the file copy.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Environment variable naming an explicit log file, or `off`.
pub const LOG_FILE_ENV: &str = "FOLIO_RAG_LOG_FILE";

/// Filter used when `RUST_LOG` is unset. PDF parsing and HTTP internals are chatty at `info`.
const DEFAULT_FILTER: &str = "info,lopdf=warn,pdf_extract=warn,hyper_util=warn,reqwest=warn";

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "folio-rag.log";

/// Where the file copy of the log goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// `logs/folio-rag.log` in the working directory.
    Default,
    /// Append to an explicit path.
    File(PathBuf),
    /// stderr only.
    Disabled,
}

impl LogDestination {
    /// Resolve the destination from the raw `FOLIO_RAG_LOG_FILE` value.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Default,
            Some(raw) if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") => {
                Self::Disabled
            }
            Some(raw) => Self::File(PathBuf::from(raw)),
        }
    }
}

/// Install the global subscriber. Safe to call once per process.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    let destination = LogDestination::from_env_value(std::env::var(LOG_FILE_ENV).ok().as_deref());
    match file_writer(&destination) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

/// Open the file side of the log. Failures are reported on stderr and leave stderr-only logging.
fn file_writer(destination: &LogDestination) -> Option<NonBlocking> {
    let (non_blocking, guard) = match destination {
        LogDestination::Disabled => return None,
        LogDestination::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .inspect_err(|err| {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                })
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        LogDestination::Default => {
            std::fs::create_dir_all(DEFAULT_LOG_DIR)
                .inspect_err(|err| {
                    eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}");
                })
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_FILE,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
