use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and query activity.
#[derive(Default)]
pub struct PipelineMetrics {
    ingest_runs: AtomicU64,
    documents_loaded: AtomicU64,
    chunks_indexed: AtomicU64,
    load_failures: AtomicU64,
    retrievals: AtomicU64,
    answers: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed ingestion run.
    pub fn record_ingest(&self, documents: u64, chunks: u64, failures: u64) {
        self.ingest_runs.fetch_add(1, Ordering::Relaxed);
        self.documents_loaded.fetch_add(documents, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
        self.load_failures.fetch_add(failures, Ordering::Relaxed);
    }

    /// Record a served retrieval.
    pub fn record_retrieval(&self) {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a generated answer.
    pub fn record_answer(&self) {
        self.answers.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ingest_runs: self.ingest_runs.load(Ordering::Relaxed),
            documents_loaded: self.documents_loaded.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            retrievals: self.retrievals.load(Ordering::Relaxed),
            answers: self.answers.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Completed ingestion runs since startup.
    pub ingest_runs: u64,
    /// Raw documents loaded across all runs.
    pub documents_loaded: u64,
    /// Chunks written across all runs.
    pub chunks_indexed: u64,
    /// Files skipped because they could not be loaded.
    pub load_failures: u64,
    /// Retrieval calls served.
    pub retrievals: u64,
    /// Answers generated.
    pub answers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingest_runs() {
        let metrics = PipelineMetrics::new();
        metrics.record_ingest(2, 7, 1);
        metrics.record_ingest(1, 3, 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ingest_runs, 2);
        assert_eq!(snapshot.documents_loaded, 3);
        assert_eq!(snapshot.chunks_indexed, 10);
        assert_eq!(snapshot.load_failures, 1);
    }

    #[test]
    fn query_counters_start_at_zero() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        metrics.record_retrieval();
        metrics.record_answer();
        metrics.record_retrieval();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retrievals, 2);
        assert_eq!(snapshot.answers, 1);
    }
}
