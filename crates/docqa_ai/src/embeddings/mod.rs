use docqa_core::error::DocQaError;

/// A loaded embedding model. Implementations must be deterministic: the same input always
/// yields a bit-identical vector.
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, input: &str) -> Result<Vec<f32>, DocQaError>;

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, DocQaError> {
        inputs.iter().map(|input| self.embed(input)).collect()
    }
}

pub mod hashing;
pub mod ollama_embed;
pub mod service;

pub use hashing::HashingEmbedder;
pub use ollama_embed::OllamaEmbedder;
pub use service::{EmbeddingService, ModelHandle};
