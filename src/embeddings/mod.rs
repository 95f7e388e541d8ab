// Embeddings module
// The embedder boundary (text -> fixed-length vector) and the persisted
// vector codec

pub mod codec;
pub mod ollama;

use crate::Result;
use async_trait::async_trait;

/// Anything that can turn text into a fixed-length vector. Implementations
/// must return `Ok(None)` for empty or whitespace-only input; backend
/// failures surface as errors and are degraded by the retrieval layer.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;
}
