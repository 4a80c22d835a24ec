use async_trait::async_trait;

use crate::core::errors::ApiError;

/// Similarity search over the document corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages, best match first. No match is `Ok(vec![])`.
    async fn retrieve(&self, topic: &str, k: usize) -> Result<Vec<String>, ApiError>;
}

/// Single-shot text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;
}
