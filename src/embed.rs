//! Dense embedding collaborator boundary.
//!
//! The pipeline never computes semantic embeddings itself; it consumes an
//! [`Embedder`] that maps text to a fixed-dimension dense vector. Any model
//! backend can sit behind the trait as long as it is deterministic for a
//! given model version and pure (no state mutation), so indexing stays
//! reproducible.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rustc_hash::FxHasher;

use crate::types::RagError;

/// Maps text to a fixed-dimension dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. The returned vector length must equal
    /// [`dimension`](Embedder::dimension) for every input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// The fixed output dimension of this model.
    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing embedder.
///
/// Hashes lowercased tokens and character trigrams into `dimension` buckets
/// and L2-normalizes the result. Texts sharing vocabulary land in shared
/// buckets, so cosine similarity tracks lexical overlap: enough signal for
/// offline runs and deterministic tests without a model download.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// An embedder producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashEmbedder {
    /// Matches the 384-dimension reference configuration.
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut buckets = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            bump(&mut buckets, token, 1.0);
            let chars: Vec<char> = token.chars().collect();
            for trigram in chars.windows(3) {
                let gram: String = trigram.iter().collect();
                bump(&mut buckets, &gram, 0.5);
            }
        }

        let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut buckets {
                *value /= norm;
            }
        }
        Ok(buckets)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn bump(buckets: &mut [f32], feature: &str, weight: f32) {
    let mut hasher = FxHasher::default();
    feature.hash(&mut hasher);
    let hash = hasher.finish();
    let slot = (hash % buckets.len() as u64) as usize;
    // Signed hashing: the hash's top bit picks the bucket sign.
    let sign = if hash & (1u64 << 63) == 0 { 1.0 } else { -1.0 };
    buckets[slot] += sign * weight;
}
