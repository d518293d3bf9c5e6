//! Shared HTTP client construction for outbound service calls.

use reqwest::Client;
use std::time::Duration;

/// Build a `reqwest` client with a user agent and a hard request timeout.
///
/// Every external call (store, embeddings, generation) goes through a client built here so that
/// a hung dependency surfaces as a timeout error instead of blocking the caller.
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

/// Join a base URL and a relative path with exactly one slash between them.
pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
