use std::cmp::Ordering;
use std::sync::Arc;

use docqa_core::domain::Chunk;
use docqa_core::error::DocQaError;

pub mod similarity;

/// A chunk together with the vector computed for it at build time.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Arc<Chunk>,
    pub vector: Vec<f32>,
    norm: f32,
}

impl IndexEntry {
    pub fn new(chunk: Arc<Chunk>, vector: Vec<f32>) -> Self {
        let norm = similarity::l2_norm(&vector);
        Self {
            chunk,
            vector,
            norm,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

/// In-memory nearest-neighbour index over the chunks of one document.
///
/// The index is a snapshot: [`VectorIndex::build`] swaps the whole entry set, nothing is ever
/// added or removed piecemeal. Exclusion between `build` and `search` is the owner's job; the
/// orchestrator keeps the index behind a `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with `entries`. Entries are validated first, so a rejected build
    /// leaves the previous snapshot in place.
    pub fn build(&mut self, mut entries: Vec<IndexEntry>) -> Result<(), DocQaError> {
        let dims = entries.first().map(|e| e.vector.len());
        for e in &entries {
            if Some(e.vector.len()) != dims || e.vector.is_empty() {
                return Err(DocQaError::embedding(format!(
                    "chunk {} has {} dimensions, expected {}",
                    e.chunk.sequence,
                    e.vector.len(),
                    dims.unwrap_or(0)
                )));
            }
            if e.vector.iter().any(|x| !x.is_finite()) {
                return Err(DocQaError::embedding(format!(
                    "chunk {} has a non-finite vector",
                    e.chunk.sequence
                )));
            }
        }
        entries.sort_by_key(|e| e.chunk.sequence);

        tracing::debug!(entries = entries.len(), dims = ?dims, "vector index rebuilt");
        self.entries = entries;
        self.dims = dims;
        Ok(())
    }

    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self, DocQaError> {
        let mut index = Self::new();
        index.build(entries)?;
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dims
    }

    /// The `k` entries most similar to `query`, best first; equal scores keep chunk order.
    /// `k` is raised to 1 and capped at the number of entries.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, DocQaError> {
        let Some(dims) = self.dims.filter(|_| !self.entries.is_empty()) else {
            return Err(DocQaError::IndexEmpty);
        };
        if query.len() != dims {
            return Err(DocQaError::embedding(format!(
                "query has {} dimensions, index has {dims}",
                query.len()
            )));
        }
        let k = k.max(1).min(self.entries.len());

        let qnorm = similarity::l2_norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                (
                    i,
                    similarity::cosine_similarity(query, &e.vector, qnorm, e.norm),
                )
            })
            .collect();

        // Entries are stored in sequence order, so the position is the tie-breaker.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: Arc::clone(&self.entries[i].chunk),
                score,
            })
            .collect())
    }
}
