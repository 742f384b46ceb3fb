use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{RetrievalError, RetrievalResult};
use crate::core::http::{describe_failure, join_url};

pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const EMBEDDING_DIMENSIONS: usize = 1536;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings with the platform key (not an organization key).
pub struct OpenAIEmbedder {
    http: Client,
    endpoint: String,
    api_key: Option<Zeroizing<String>>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(http: Client, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            http,
            endpoint: join_url(base_url, "embeddings"),
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .map(|k| Zeroizing::new(k.to_string())),
            model: EMBEDDING_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            RetrievalError::ConfigurationError(
                "OPENAI_API_KEY is not configured for knowledge retrieval".to_string(),
            )
        })?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key.as_str()))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| RetrievalError::NetworkError(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::NetworkError(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(RetrievalError::EmbeddingError(describe_failure(
                "OpenAI", status, &body,
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| RetrievalError::InvalidResponse(format!("Failed to parse embedding: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::InvalidResponse("Embedding response is empty".into()))
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }
}
