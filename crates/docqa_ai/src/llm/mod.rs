use docqa_core::error::DocQaError;

/// A local language-model runtime. One call is one blocking request.
pub trait Llm: Send + Sync {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, DocQaError>;
}

pub mod generation;
pub mod ollama_llm;

pub use generation::GenerationClient;
pub use ollama_llm::OllamaLlm;
