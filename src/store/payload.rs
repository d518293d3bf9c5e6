//! Helpers for constructing and reading stored chunk payloads.

use crate::processing::ChunkMetadata;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Payload key holding the chunk text.
pub const TEXT_KEY: &str = "text";
/// Payload key holding the SHA-256 digest of the chunk text.
pub const CHUNK_HASH_KEY: &str = "chunk_hash";
/// Payload key holding the ingestion timestamp.
pub const INGESTED_AT_KEY: &str = "ingested_at";
/// Metadata key naming the originating file.
pub const SOURCE_FILE_KEY: &str = "source_file";

/// Build the payload object stored alongside each indexed chunk.
///
/// Metadata keys are copied verbatim; `text`, `chunk_hash`, and `ingested_at` are reserved and
/// always reflect the chunk itself.
pub fn build_payload(
    text: &str,
    metadata: &ChunkMetadata,
    timestamp_rfc3339: &str,
) -> Map<String, Value> {
    let mut payload = Map::new();
    for (key, value) in metadata {
        payload.insert(key.clone(), Value::String(value.clone()));
    }
    payload.insert(TEXT_KEY.into(), Value::String(text.to_string()));
    payload.insert(
        CHUNK_HASH_KEY.into(),
        Value::String(compute_chunk_hash(text)),
    );
    payload.insert(
        INGESTED_AT_KEY.into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    payload
}

/// Split a stored payload back into chunk text and string metadata.
///
/// Non-string values are rendered with their JSON representation. Reserved bookkeeping keys
/// stay in the metadata so callers can inspect them.
pub fn split_payload(mut payload: Map<String, Value>) -> (String, ChunkMetadata) {
    let text = match payload.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let metadata = payload
        .into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, rendered)
        })
        .collect();
    (text, metadata)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_stable() {
        let h1 = compute_chunk_hash("Hello world");
        let h2 = compute_chunk_hash("Hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_round_trips_text_and_metadata() {
        let mut metadata = ChunkMetadata::new();
        metadata.insert("source_file".into(), "resume.md".into());
        metadata.insert("category".into(), "resume".into());

        let payload = build_payload("Rust engineer", &metadata, "2025-01-01T00:00:00Z");
        assert_eq!(payload["text"], "Rust engineer");
        assert_eq!(payload["source_file"], "resume.md");
        assert_eq!(payload["ingested_at"], "2025-01-01T00:00:00Z");

        let (text, restored) = split_payload(payload);
        assert_eq!(text, "Rust engineer");
        assert_eq!(restored["category"], "resume");
        assert_eq!(restored[CHUNK_HASH_KEY], compute_chunk_hash("Rust engineer"));
        assert!(!restored.contains_key(TEXT_KEY));
    }

    #[test]
    fn metadata_cannot_shadow_reserved_keys() {
        let mut metadata = ChunkMetadata::new();
        metadata.insert("text".into(), "spoofed".into());
        let payload = build_payload("real", &metadata, "2025-01-01T00:00:00Z");
        assert_eq!(payload["text"], "real");
    }
}
