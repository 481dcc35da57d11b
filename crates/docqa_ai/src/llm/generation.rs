use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use docqa_core::error::DocQaError;

use super::Llm;

/// Bounded-wait front for an [`Llm`].
///
/// Each request runs on its own worker thread while the caller waits on a channel for at most
/// the timeout. On expiry the caller gets `GenerationTimeout` and the worker is left to finish
/// on its own; its late result is dropped. Nothing is retried. A timeout raised by the backend
/// itself is reported with the deadline the caller asked for.
#[derive(Clone)]
pub struct GenerationClient {
    llm: Arc<dyn Llm>,
    model: String,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(llm: Arc<dyn Llm>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            llm,
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(&self, prompt: &str) -> Result<String, DocQaError> {
        self.generate_with_timeout(prompt, self.timeout)
    }

    pub fn generate_with_timeout(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, DocQaError> {
        let (tx, rx) = mpsc::channel();
        let llm = Arc::clone(&self.llm);
        let model = self.model.clone();
        let prompt = prompt.to_string();

        let started = Instant::now();
        thread::Builder::new()
            .name("docqa-generate".to_string())
            .spawn(move || {
                let result = llm.generate(&model, &prompt);
                // The receiver is gone if the caller already timed out.
                let _ = tx.send(result);
            })
            .map_err(|e| DocQaError::generation(format!("failed to spawn generation worker: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &result {
                    Ok(text) => tracing::info!(
                        model = %self.model,
                        elapsed_ms,
                        answer_chars = text.chars().count(),
                        "generation finished"
                    ),
                    Err(err) => tracing::warn!(
                        model = %self.model,
                        elapsed_ms,
                        code = err.code(),
                        error = %err,
                        "generation failed"
                    ),
                }
                result.map_err(|err| match err {
                    DocQaError::GenerationTimeout { .. } => DocQaError::GenerationTimeout { timeout },
                    other => other,
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    model = %self.model,
                    timeout_ms = timeout.as_millis() as u64,
                    "generation timed out; abandoning worker"
                );
                Err(DocQaError::GenerationTimeout { timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(DocQaError::generation(
                "generation worker exited without a result",
            )),
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
