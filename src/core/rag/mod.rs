//! Knowledge retrieval.
//!
//! Agents may be linked to a knowledge base whose chunks live in a vector
//! collection. Before generation the pipeline embeds the user's question,
//! fetches the best matching chunks and joins them into a context block.

pub mod embeddings;
pub mod qdrant;

pub use embeddings::{EMBEDDING_DIMENSIONS, EMBEDDING_MODEL, Embedder, OpenAIEmbedder};
pub use qdrant::QdrantRetriever;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chunks fetched per question.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Retrieval failed: configuration error: {0}")]
    ConfigurationError(String),

    #[error("Retrieval failed: embedding error: {0}")]
    EmbeddingError(String),

    #[error("Retrieval failed: network error: {0}")]
    NetworkError(String),

    #[error("Retrieval failed: {0}")]
    BackendError(String),

    #[error("Retrieval failed: invalid response: {0}")]
    InvalidResponse(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// One knowledge chunk matched against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f32,
    pub document_id: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Best `top_k` chunks of `collection` for `query`, highest score first.
    ///
    /// A collection that does not exist yet is created empty and yields no
    /// results.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> RetrievalResult<Vec<RetrievedChunk>>;
}

/// Order by descending score, keeping backend order for ties.
pub fn rank(mut chunks: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    chunks.truncate(top_k);
    chunks
}

/// Join chunk contents with a blank line.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            score,
            document_id: String::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let ranked = rank(
            vec![
                chunk("a", 0.2),
                chunk("b", 0.9),
                chunk("c", 0.5),
                chunk("d", 0.5),
            ],
            3,
        );
        let order: Vec<&str> = ranked.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_rank_zero_top_k() {
        assert!(rank(vec![chunk("a", 1.0)], 0).is_empty());
    }

    #[test]
    fn test_build_context() {
        let chunks = vec![chunk("first", 0.9), chunk("second", 0.8)];
        assert_eq!(build_context(&chunks), "first\n\nsecond");
        assert_eq!(build_context(&[]), "");
    }
}
