use std::time::Duration;

use docqa_core::error::DocQaError;
use serde::{Deserialize, Serialize};

use super::Llm;
use crate::ollama::{OllamaClient, RuntimeError};

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    request_timeout: Duration,
}

impl OllamaLlm {
    /// `request_timeout` bounds the HTTP exchange itself. [`super::GenerationClient`] enforces
    /// the caller-facing deadline; keep this at least as long so the two do not race. An HTTP
    /// timeout is reported with `request_timeout`; `GenerationClient` rewrites it to its own
    /// deadline.
    pub fn new(client: OllamaClient, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, DocQaError> {
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let resp: GenerateResponse = self
            .client
            .post_json("/api/generate", &req, self.request_timeout)
            .map_err(|e| match e {
                RuntimeError::Timeout { .. } => DocQaError::GenerationTimeout {
                    timeout: self.request_timeout,
                },
                other => DocQaError::generation(other),
            })?;

        if resp.response.trim().is_empty() {
            return Err(DocQaError::generation("model returned an empty response"));
        }
        Ok(resp.response)
    }
}
