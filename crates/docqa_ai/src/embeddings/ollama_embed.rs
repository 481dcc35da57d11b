use std::sync::Arc;
use std::time::Duration;

use docqa_core::error::DocQaError;
use serde::{Deserialize, Serialize};

use super::service::ModelHandle;
use super::Embedder;
use crate::ollama::{OllamaClient, RuntimeError};

// Chunking keeps inputs far below this; the guard only protects the runtime from pathological input.
const MAX_INPUT_BYTES: usize = 12_000;
const WARM_UP_TEXT: &str = "warm-up";

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Check the runtime has `model`, then embed a short text to warm it up and learn its
    /// dimensionality. Every failure here is a `ModelLoad` error.
    pub fn connect(
        client: OllamaClient,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, DocQaError> {
        let load_err = |cause: String| DocQaError::ModelLoad {
            model: model.to_string(),
            cause,
        };

        let health = client
            .health_check(&[model])
            .map_err(|e| load_err(e.to_string()))?;
        if !health.is_ready() {
            return Err(load_err(format!(
                "model is not available in Ollama at {}; run `ollama pull {model}`",
                client.base_url()
            )));
        }

        let sample = request(&client, model, WARM_UP_TEXT, timeout)
            .map_err(|e| load_err(e.to_string()))?;
        if sample.is_empty() {
            return Err(load_err("warm-up embedding was empty".to_string()));
        }

        Ok(Self {
            client,
            model: model.to_string(),
            dimensions: sample.len(),
            timeout,
        })
    }

    /// A lazily-loading handle: the runtime is not contacted until the first embedding.
    pub fn handle(client: OllamaClient, model: &str, timeout: Duration) -> ModelHandle {
        let name = model.to_string();
        ModelHandle::new(model, move || {
            let embedder = OllamaEmbedder::connect(client.clone(), &name, timeout)?;
            Ok(Arc::new(embedder) as Arc<dyn Embedder>)
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, DocQaError> {
        let prompt = truncate_at_char_boundary(input, MAX_INPUT_BYTES);
        let v = request(&self.client, &self.model, prompt, self.timeout)
            .map_err(DocQaError::embedding)?;
        if v.is_empty() {
            return Err(DocQaError::embedding("embeddings response was empty"));
        }
        Ok(v)
    }
}

fn request(
    client: &OllamaClient,
    model: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<Vec<f32>, RuntimeError> {
    let req = EmbeddingsRequest { model, prompt };
    let resp: EmbeddingsResponse = client.post_json("/api/embeddings", &req, timeout)?;
    Ok(resp.embedding)
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
