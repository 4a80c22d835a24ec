//! RagStore trait: storage backend for corpus chunks and their embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A stored corpus chunk with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Hex SHA-256 of source and chunk index.
    pub chunk_id: String,
    pub content: String,
    /// Corpus-relative file path the chunk came from.
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert multiple chunks in one transaction; existing ids are replaced.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Up to `limit` chunks most similar to the query embedding, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Embedding model the stored vectors were computed with, if recorded.
    async fn embedding_model(&self) -> Result<Option<String>, ApiError>;

    /// Replace every chunk with `items` and record the model they were
    /// embedded with, atomically. Readers see either the old index or the new one.
    async fn reindex(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
        embedding_model: &str,
    ) -> Result<(), ApiError>;
}
