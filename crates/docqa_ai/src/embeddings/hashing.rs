use std::sync::Arc;

use docqa_core::error::DocQaError;
use sha2::{Digest, Sha256};

use super::service::ModelHandle;
use super::Embedder;

/// Offline embedder based on feature hashing.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256; the first eight bytes pick a
/// bucket and the ninth byte picks the sign. The bucket counts are L2-normalized, so texts that
/// share vocabulary score high under cosine similarity. No runtime and no model download.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    name: String,
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            name: format!("hashing-{dimensions}"),
            dimensions,
        }
    }

    /// A handle that is ready immediately; there is nothing to load.
    pub fn handle(dimensions: usize) -> ModelHandle {
        ModelHandle::ready(Arc::new(Self::new(dimensions)))
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn model(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, DocQaError> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokens(input) {
            let (idx, sign) = self.bucket(&token);
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
