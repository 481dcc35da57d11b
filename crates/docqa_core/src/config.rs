use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ChunkingParams;
use crate::error::DocQaError;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_GENERATION_MODEL: &str = "qwen2.5:0.5b";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Embeddings computed by the local Ollama runtime.
    Ollama { model: String },
    /// Offline feature-hashing embeddings; no runtime required.
    Hashing { dimensions: usize },
}

impl EmbeddingBackend {
    pub fn model_name(&self) -> String {
        match self {
            EmbeddingBackend::Ollama { model } => model.clone(),
            EmbeddingBackend::Hashing { dimensions } => format!("hashing-{dimensions}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocQaConfig {
    pub ollama_base_url: String,
    pub generation_model: String,
    pub embedding: EmbeddingBackend,
    pub chunking: ChunkingParams,
    pub top_k: usize,
    pub generation_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub embed_batch_size: usize,
}

impl Default for DocQaConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding: EmbeddingBackend::Ollama {
                model: DEFAULT_EMBEDDING_MODEL.to_string(),
            },
            chunking: ChunkingParams::default(),
            top_k: 4,
            generation_timeout_secs: 180,
            embedding_timeout_secs: 60,
            embed_batch_size: 32,
        }
    }
}

impl DocQaConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    /// Build a validated config from `DOCQA_*` keys. Unset keys keep their defaults; callers
    /// pass `std::env::var`, possibly layered under command-line overrides.
    ///
    /// Recognized keys:
    /// - `DOCQA_OLLAMA_BASE_URL` (falls back to `OLLAMA_BASE_URL`)
    /// - `DOCQA_GENERATION_MODEL`
    /// - `DOCQA_EMBEDDER` = `ollama` | `hashing`
    /// - `DOCQA_EMBEDDING_MODEL`, `DOCQA_EMBEDDING_DIMENSIONS`
    /// - `DOCQA_CHUNK_SIZE`, `DOCQA_CHUNK_OVERLAP`, `DOCQA_TOP_K`
    /// - `DOCQA_GENERATION_TIMEOUT_SECS`, `DOCQA_EMBEDDING_TIMEOUT_SECS`, `DOCQA_EMBED_BATCH_SIZE`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DocQaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(url) = get("DOCQA_OLLAMA_BASE_URL").or_else(|| get("OLLAMA_BASE_URL")) {
            cfg.ollama_base_url = url;
        }
        if let Some(model) = get("DOCQA_GENERATION_MODEL") {
            cfg.generation_model = model;
        }

        let embedder = get("DOCQA_EMBEDDER").unwrap_or_else(|| "ollama".to_string());
        cfg.embedding = match embedder.to_ascii_lowercase().as_str() {
            "ollama" => EmbeddingBackend::Ollama {
                model: get("DOCQA_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            },
            "hashing" => EmbeddingBackend::Hashing {
                dimensions: parse_or(
                    get("DOCQA_EMBEDDING_DIMENSIONS"),
                    "DOCQA_EMBEDDING_DIMENSIONS",
                    DEFAULT_HASHING_DIMENSIONS,
                )?,
            },
            other => {
                return Err(DocQaError::invalid_config(format!(
                    "DOCQA_EMBEDDER must be 'ollama' or 'hashing', got '{other}'"
                )))
            }
        };

        cfg.chunking.max_chunk_len = parse_or(
            get("DOCQA_CHUNK_SIZE"),
            "DOCQA_CHUNK_SIZE",
            cfg.chunking.max_chunk_len,
        )?;
        cfg.chunking.overlap = parse_or(
            get("DOCQA_CHUNK_OVERLAP"),
            "DOCQA_CHUNK_OVERLAP",
            cfg.chunking.overlap,
        )?;
        cfg.top_k = parse_or(get("DOCQA_TOP_K"), "DOCQA_TOP_K", cfg.top_k)?;
        cfg.generation_timeout_secs = parse_or(
            get("DOCQA_GENERATION_TIMEOUT_SECS"),
            "DOCQA_GENERATION_TIMEOUT_SECS",
            cfg.generation_timeout_secs,
        )?;
        cfg.embedding_timeout_secs = parse_or(
            get("DOCQA_EMBEDDING_TIMEOUT_SECS"),
            "DOCQA_EMBEDDING_TIMEOUT_SECS",
            cfg.embedding_timeout_secs,
        )?;
        cfg.embed_batch_size = parse_or(
            get("DOCQA_EMBED_BATCH_SIZE"),
            "DOCQA_EMBED_BATCH_SIZE",
            cfg.embed_batch_size,
        )?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DocQaError> {
        validate_chunking(&self.chunking)?;
        if self.top_k == 0 {
            return Err(DocQaError::invalid_config("top_k must be at least 1"));
        }
        if self.generation_timeout_secs == 0 {
            return Err(DocQaError::invalid_config(
                "generation timeout must be at least 1 second",
            ));
        }
        if self.embedding_timeout_secs == 0 {
            return Err(DocQaError::invalid_config(
                "embedding timeout must be at least 1 second",
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(DocQaError::invalid_config(
                "embed batch size must be at least 1",
            ));
        }
        if self.generation_model.trim().is_empty() {
            return Err(DocQaError::invalid_config(
                "generation model must not be empty",
            ));
        }
        match &self.embedding {
            EmbeddingBackend::Ollama { model } if model.trim().is_empty() => Err(
                DocQaError::invalid_config("embedding model must not be empty"),
            ),
            EmbeddingBackend::Hashing { dimensions: 0 } => Err(DocQaError::invalid_config(
                "hashing embedder needs at least one dimension",
            )),
            _ => Ok(()),
        }
    }
}

pub fn validate_chunking(params: &ChunkingParams) -> Result<(), DocQaError> {
    if params.max_chunk_len == 0 {
        return Err(DocQaError::invalid_config(
            "max chunk length must be at least 1",
        ));
    }
    if params.overlap >= params.max_chunk_len {
        return Err(DocQaError::invalid_config(format!(
            "chunk overlap ({}) must be smaller than max chunk length ({})",
            params.overlap, params.max_chunk_len
        )));
    }
    Ok(())
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &str,
    default: T,
) -> Result<T, DocQaError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| {
            DocQaError::invalid_config(format!("{key} has an invalid value '{v}'"))
        }),
    }
}
