use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::{DocQaConfig, EmbeddingBackend};
use docqa_core::error::DocQaError;

use crate::embeddings::{EmbeddingService, HashingEmbedder, ModelHandle, OllamaEmbedder};
use crate::llm::{GenerationClient, OllamaLlm};
use crate::ollama::{OllamaClient, RuntimeHealth};
use crate::orchestrator::{Orchestrator, PipelineSettings};

// The HTTP timeout trails the caller-facing deadline so the deadline is what callers observe.
const HTTP_GRACE: Duration = Duration::from_secs(5);

/// Wire an [`Orchestrator`] to the local Ollama runtime described by `config`.
///
/// Nothing is contacted here: the embedding model loads on first use (or via
/// [`Orchestrator::warm_up`]) and generation happens per question.
pub fn build_orchestrator(config: &DocQaConfig) -> Result<Orchestrator, DocQaError> {
    config.validate()?;
    let client = OllamaClient::new(&config.ollama_base_url)?;

    let handle = embedding_handle(&client, config);
    let embeddings = EmbeddingService::new(Arc::new(handle), config.embed_batch_size);

    let llm = OllamaLlm::new(client, config.generation_timeout() + HTTP_GRACE);
    let generator = GenerationClient::new(
        Arc::new(llm),
        config.generation_model.clone(),
        config.generation_timeout(),
    );

    tracing::info!(
        base_url = %config.ollama_base_url,
        generation_model = %config.generation_model,
        embedding_model = %config.embedding.model_name(),
        top_k = config.top_k,
        "orchestrator configured"
    );
    Ok(Orchestrator::new(
        PipelineSettings::from(config),
        embeddings,
        generator,
    ))
}

fn embedding_handle(client: &OllamaClient, config: &DocQaConfig) -> ModelHandle {
    match &config.embedding {
        EmbeddingBackend::Ollama { model } => {
            OllamaEmbedder::handle(client.clone(), model, config.embedding_timeout())
        }
        EmbeddingBackend::Hashing { dimensions } => HashingEmbedder::handle(*dimensions),
    }
}

/// Ask the runtime which of the configured models are missing. The hashing
/// backend needs no model, so only the generation model is checked for it.
pub fn check_runtime(config: &DocQaConfig) -> Result<RuntimeHealth, DocQaError> {
    let client = OllamaClient::new(&config.ollama_base_url)?;
    let mut required = vec![config.generation_model.as_str()];
    if let EmbeddingBackend::Ollama { model } = &config.embedding {
        required.push(model.as_str());
    }
    client
        .health_check(&required)
        .map_err(DocQaError::generation)
}
