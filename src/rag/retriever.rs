use std::sync::Arc;

use async_trait::async_trait;

use super::embedder::Embedder;
use super::store::RagStore;
use crate::core::errors::ApiError;
use crate::tutor::Retriever;

/// Embeds the topic and returns the nearest stored chunks.
pub struct VectorRetriever {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, topic: &str, k: usize) -> Result<Vec<String>, ApiError> {
        let topic = topic.trim();
        if topic.is_empty() || k == 0 || self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[topic.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedder returned no vector".to_string()))?;

        let results = self.store.search(&query_embedding, k).await?;
        tracing::debug!(
            "Retrieved {} passage(s) for '{}' (best score {:?})",
            results.len(),
            topic,
            results.first().map(|r| r.score)
        );

        Ok(results.into_iter().map(|r| r.chunk.content).collect())
    }
}
