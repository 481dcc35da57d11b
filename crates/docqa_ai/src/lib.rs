pub mod embeddings;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod orchestrator;
pub mod prompts;
pub mod runtime;

pub use orchestrator::Orchestrator;
pub use runtime::{build_orchestrator, check_runtime};
