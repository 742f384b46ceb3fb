//! Qdrant REST retriever.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{Embedder, RetrievalError, RetrievalResult, RetrievedChunk, Retriever, rank};
use crate::core::http::{join_url, truncate_body};

#[derive(Debug, Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl ScoredPoint {
    fn into_chunk(self) -> RetrievedChunk {
        let payload = self.payload.unwrap_or_default();
        let content = payload
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let document_id = match payload.get("document_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        RetrievedChunk {
            content,
            score: self.score,
            document_id,
            metadata: payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionState {
    Existing,
    Created,
}

pub struct QdrantRetriever {
    http: Client,
    base_url: String,
    api_key: Option<Zeroizing<String>>,
    embedder: Arc<dyn Embedder>,
}

impl QdrantRetriever {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: Option<&str>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .map(|k| Zeroizing::new(k.to_string())),
            embedder,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key.as_str()),
            None => builder,
        }
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        join_url(&self.base_url, &format!("collections/{collection}{suffix}"))
    }

    async fn ensure_collection(&self, collection: &str) -> RetrievalResult<CollectionState> {
        let response = self
            .authorized(self.http.get(self.collection_url(collection, "/exists")))
            .send()
            .await
            .map_err(|e| RetrievalError::NetworkError(format!("Qdrant request failed: {e}")))?;
        let exists: QdrantEnvelope<ExistsResult> = read_json(response).await?;
        if exists.result.exists {
            return Ok(CollectionState::Existing);
        }

        let dimensions = self.embedder.dimensions();
        let response = self
            .authorized(self.http.put(self.collection_url(collection, "")))
            .json(&json!({ "vectors": { "size": dimensions, "distance": "Cosine" } }))
            .send()
            .await
            .map_err(|e| RetrievalError::NetworkError(format!("Qdrant request failed: {e}")))?;

        let status = response.status();
        // A concurrent session may have created it first.
        if status == StatusCode::CONFLICT {
            return Ok(CollectionState::Existing);
        }
        let _: Value = read_json(response).await?;
        info!(collection, dimensions, "Created knowledge collection");
        Ok(CollectionState::Created)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> RetrievalResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RetrievalError::NetworkError(format!("Failed to read response: {e}")))?;
    if !status.is_success() {
        return Err(RetrievalError::BackendError(format!(
            "Qdrant error ({status}): {}",
            truncate_body(&body)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| RetrievalError::InvalidResponse(format!("Failed to parse Qdrant response: {e}")))
}

#[async_trait]
impl Retriever for QdrantRetriever {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> RetrievalResult<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if collection.trim().is_empty() {
            return Err(RetrievalError::ConfigurationError(
                "Collection name is required".to_string(),
            ));
        }

        if self.ensure_collection(collection).await? == CollectionState::Created {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let response = self
            .authorized(
                self.http
                    .post(self.collection_url(collection, "/points/query")),
            )
            .json(&json!({ "query": vector, "limit": top_k, "with_payload": true }))
            .send()
            .await
            .map_err(|e| RetrievalError::NetworkError(format!("Qdrant request failed: {e}")))?;

        let result: QdrantEnvelope<QueryResult> = read_json(response).await?;
        let chunks = result
            .result
            .points
            .into_iter()
            .map(ScoredPoint::into_chunk)
            .collect();
        let ranked = rank(chunks, top_k);
        debug!(collection, hits = ranked.len(), "Knowledge search complete");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_mapping() {
        let point: ScoredPoint = serde_json::from_str(
            r#"{"id": 7, "version": 1, "score": 0.82,
                "payload": {"content": "Opening hours are 9-5.", "document_id": 12, "page": 3}}"#,
        )
        .unwrap();
        let chunk = point.into_chunk();
        assert_eq!(chunk.content, "Opening hours are 9-5.");
        assert_eq!(chunk.document_id, "12");
        assert_eq!(chunk.metadata["page"], 3);
        assert!((chunk.score - 0.82).abs() < f32::EPSILON);
    }

    #[test]
    fn test_point_without_payload() {
        let point: ScoredPoint = serde_json::from_str(r#"{"id": "a", "score": 0.1}"#).unwrap();
        let chunk = point.into_chunk();
        assert_eq!(chunk.content, "");
        assert_eq!(chunk.document_id, "");
        assert!(chunk.metadata.is_empty());
    }
}
