//! HTTP client wrapper for a Qdrant collection.

use crate::http::format_endpoint;
use crate::processing::enrich::CATEGORY_KEY;
use crate::store::{
    VectorStore,
    payload::SOURCE_FILE_KEY,
    types::{
        CountResponse, PointInsert, QueryResponse, QueryResponseResult, ScoredPoint, StoreError,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Payload fields indexed for filtering.
const KEYWORD_INDEXES: [&str; 2] = [SOURCE_FILE_KEY, CATEGORY_KEY];

/// Lightweight HTTP client bound to one Qdrant collection.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: usize,
}

impl QdrantStore {
    /// Construct a store client for `collection` on the Qdrant instance at `url`.
    pub fn new(
        client: Client,
        url: &str,
        api_key: Option<String>,
        collection: String,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let base_url = normalize_base_url(url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %collection,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
            collection,
            vector_size,
        })
    }

    async fn collection_exists(&self) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::error!(
                    collection = %self.collection,
                    error = %error,
                    "Collection existence check failed"
                );
                Err(error)
            }
        }
    }

    async fn create_collection(&self) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::info!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Collection created"
        );
        Ok(())
    }

    async fn ensure_payload_indexes(&self) -> Result<(), StoreError> {
        for field in KEYWORD_INDEXES {
            let response = self
                .request(Method::PUT, &format!("collections/{}/index", self.collection))
                .json(&json!({ "field_name": field, "field_schema": "keyword" }))
                .send()
                .await?;

            let status = response.status();
            if status.is_success() || status == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, "Payload index ensured");
            } else {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::warn!(
                    collection = %self.collection,
                    field,
                    error = %error,
                    "Failed to ensure payload index"
                );
            }
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), StoreError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        if !self.collection_exists().await? {
            self.create_collection().await?;
        }
        self.ensure_payload_indexes().await
    }

    async fn upsert(&self, points: Vec<PointInsert>) -> Result<usize, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }
        if let Some(point) = points.iter().find(|p| p.vector.len() != self.vector_size) {
            return Err(StoreError::DimensionMismatch {
                expected: self.vector_size,
                actual: point.vector.len(),
            });
        }

        let count = points.len();
        let serialized: Vec<Value> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let response = self
            .request(Method::PUT, &format!("collections/{}/points", self.collection))
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(collection = %self.collection, points = count, "Points upserted");
        Ok(count)
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": with_vectors,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(
                collection = %self.collection,
                "Collection missing; no points to search"
            );
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload.unwrap_or_default(),
                vector: point.vector.and_then(parse_vector),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/count", self.collection),
            )
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::UnexpectedStatus { status, body });
        }
        let CountResponse { result } = response.json().await?;
        Ok(result.count)
    }

    async fn delete_by_source(&self, source_file: &str) -> Result<(), StoreError> {
        let filter = json!({
            "filter": {
                "must": [
                    { "key": SOURCE_FILE_KEY, "match": { "value": source_file } }
                ]
            }
        });
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/delete", self.collection),
            )
            .query(&[("wait", true)])
            .json(&filter)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.ensure_success(response).await?;
        tracing::debug!(collection = %self.collection, source_file, "Deleted points for source");
        Ok(())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn parse_vector(value: Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| item.as_f64().map(|number| number as f32))
            .collect(),
        _ => None,
    }
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
