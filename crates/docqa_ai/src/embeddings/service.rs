use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use docqa_core::error::DocQaError;

use super::Embedder;

type Loader = Box<dyn Fn() -> Result<Arc<dyn Embedder>, DocQaError> + Send + Sync>;

/// Process-wide embedding model slot with at-most-once initialization.
///
/// Notes:
/// - Concurrent first callers block on the single load and all observe its outcome.
/// - A failed load is remembered; later calls get the same `ModelLoad` error and the loader is
///   never invoked again.
/// - There is no teardown: the model lives as long as the handle.
pub struct ModelHandle {
    name: String,
    loader: Loader,
    cell: OnceLock<Result<Arc<dyn Embedder>, DocQaError>>,
}

impl ModelHandle {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>, DocQaError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(loader),
            cell: OnceLock::new(),
        }
    }

    /// A handle around an already-loaded model.
    pub fn ready(embedder: Arc<dyn Embedder>) -> Self {
        let name = embedder.model().to_string();
        let cell = OnceLock::new();
        let _ = cell.set(Ok(embedder));
        Self {
            name,
            loader: Box::new(|| Err(DocQaError::embedding("model handle was created preloaded"))),
            cell,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub fn get(&self) -> Result<Arc<dyn Embedder>, DocQaError> {
        self.cell.get_or_init(|| self.load()).clone()
    }

    fn load(&self) -> Result<Arc<dyn Embedder>, DocQaError> {
        tracing::info!(model = %self.name, "loading embedding model");
        let started = Instant::now();
        match (self.loader)() {
            Ok(embedder) => {
                tracing::info!(
                    model = %self.name,
                    dims = embedder.dimensions(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "embedding model ready"
                );
                Ok(embedder)
            }
            Err(err) => {
                let err = match err {
                    DocQaError::ModelLoad { .. } => err,
                    other => DocQaError::ModelLoad {
                        model: self.name.clone(),
                        cause: other.to_string(),
                    },
                };
                tracing::error!(model = %self.name, error = %err, "embedding model failed to load");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Batched text-to-vector conversion on top of a shared [`ModelHandle`].
#[derive(Debug, Clone)]
pub struct EmbeddingService {
    handle: Arc<ModelHandle>,
    batch_size: usize,
}

impl EmbeddingService {
    pub fn new(handle: Arc<ModelHandle>, batch_size: usize) -> Self {
        Self {
            handle,
            batch_size: batch_size.max(1),
        }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    pub fn model_name(&self) -> &str {
        self.handle.name()
    }

    /// Load the model now instead of on first use.
    pub fn warm_up(&self) -> Result<usize, DocQaError> {
        Ok(self.handle.get()?.dimensions())
    }

    /// Embed `texts` in order. The first call loads the model.
    pub fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DocQaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.handle.get()?;
        let dims = model.dimensions();

        let started = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = model.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(DocQaError::embedding(format!(
                    "model returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            for v in vectors {
                check_vector(&v, dims)?;
                out.push(v);
            }
        }
        tracing::debug!(
            model = model.model(),
            texts = texts.len(),
            dims,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedded texts"
        );
        Ok(out)
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>, DocQaError> {
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| DocQaError::embedding("model returned no vector"))
    }
}

fn check_vector(v: &[f32], dims: usize) -> Result<(), DocQaError> {
    if v.len() != dims {
        return Err(DocQaError::embedding(format!(
            "vector has {} dimensions, model has {dims}",
            v.len()
        )));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(DocQaError::embedding("vector contains non-finite values"));
    }
    Ok(())
}
