use async_trait::async_trait;

use crate::core::errors::ApiError;

/// Text to vector conversion used for both indexing and querying.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
