#![deny(missing_docs)]

//! Core library for the Folio document retrieval pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Answer generation policy and provider adapters.
pub mod generation;
mod http;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Document loading, segmentation, enrichment, and indexing.
pub mod processing;
/// Query classification and evidence retrieval.
pub mod retrieval;
/// The pipeline context object and its operations.
pub mod service;
/// Vector store capability and backends.
pub mod store;
