//! Hybrid vector index: chunk storage with fused sparse+dense ranking.
//!
//! [`HybridIndex`] stores chunk records keyed by opaque id, each carrying a
//! sparse lexical vector and a dense embedding computed at ingestion time.
//! Queries rank by a convex combination of the two signals:
//!
//! ```text
//! score = alpha * cosine(dense) + (1 - alpha) * dot(sparse)
//! ```
//!
//! Ties break by insertion order (earlier chunk wins) so rankings are
//! deterministic. Reads take only a read lock and may observe an index
//! mid-ingestion; that staleness is acceptable for the query path.
//!
//! [`IndexRegistry`] mirrors a remote index service keyed by name: an index
//! is created lazily on first access with the configured dimension.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HybridConfig;
use crate::sparse::SparseVector;
use crate::types::RagError;

/// A chunk ready for upsert. `id` is assigned at upsert time when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChunk {
    pub id: Option<String>,
    pub text: String,
    pub sparse: SparseVector,
    pub dense: Vec<f32>,
    /// Provenance and any extra payload, stored verbatim.
    pub metadata: serde_json::Value,
}

impl PendingChunk {
    pub fn new(text: impl Into<String>, sparse: SparseVector, dense: Vec<f32>) -> Self {
        Self {
            id: None,
            text: text.into(),
            sparse,
            dense,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Pin the chunk to a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach metadata (e.g. the source the chunk came from).
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A ranked query hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// Result of an upsert batch: stored ids plus per-chunk rejections.
///
/// A rejected chunk (dimension mismatch) is fatal for that chunk only; the
/// rest of the batch is stored.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub stored: Vec<String>,
    pub rejected: Vec<RagError>,
}

#[derive(Debug)]
struct StoredChunk {
    text: String,
    sparse: SparseVector,
    dense: Vec<f32>,
    metadata: serde_json::Value,
    seq: u64,
}

#[derive(Debug, Default)]
struct IndexState {
    records: FxHashMap<String, StoredChunk>,
    next_seq: u64,
}

/// In-process hybrid index for one named collection.
#[derive(Debug)]
pub struct HybridIndex {
    name: String,
    dimension: usize,
    alpha: f32,
    state: RwLock<IndexState>,
}

impl HybridIndex {
    pub fn new(name: impl Into<String>, dimension: usize, alpha: f32) -> Self {
        Self {
            name: name.into(),
            dimension,
            alpha: alpha.clamp(0.0, 1.0),
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Store or replace chunk records by id.
    ///
    /// Assigns a fresh uuid when a chunk carries no id. Idempotent per id:
    /// re-upserting an existing id replaces the record but keeps its original
    /// insertion sequence, so tie-breaking (and therefore ranking) cannot
    /// shift. Chunks whose dense vector does not match the index dimension
    /// are rejected individually.
    pub fn upsert(&self, chunks: Vec<PendingChunk>) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();
        let mut state = self.state.write();
        for chunk in chunks {
            if chunk.dense.len() != self.dimension {
                outcome.rejected.push(RagError::InvalidVector {
                    expected: self.dimension,
                    actual: chunk.dense.len(),
                });
                continue;
            }
            let id = chunk
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let seq = match state.records.get(&id) {
                Some(existing) => existing.seq,
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    seq
                }
            };
            state.records.insert(
                id.clone(),
                StoredChunk {
                    text: chunk.text,
                    sparse: chunk.sparse,
                    dense: chunk.dense,
                    metadata: chunk.metadata,
                    seq,
                },
            );
            outcome.stored.push(id);
        }
        outcome
    }

    /// Fused top-k query.
    ///
    /// Returns up to `k` chunks ranked by the fused score; an empty index or
    /// `k = 0` yields an empty vector, never an error.
    pub fn query(&self, sparse: &SparseVector, dense: &[f32], k: usize) -> Vec<ScoredChunk> {
        if k == 0 {
            return Vec::new();
        }
        let state = self.state.read();
        if state.records.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(f32, u64, &String, &StoredChunk)> = state
            .records
            .iter()
            .map(|(id, record)| {
                let semantic = cosine_similarity(dense, &record.dense);
                let lexical = sparse.dot(&record.sparse);
                let score = self.alpha * semantic + (1.0 - self.alpha) * lexical;
                (score, record.seq, id, record)
            })
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        hits.truncate(k);

        hits.into_iter()
            .map(|(score, _, id, record)| ScoredChunk {
                id: id.clone(),
                text: record.text.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect()
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns `true` when no chunks are stored.
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Named-index registry with lazy creation.
#[derive(Debug)]
pub struct IndexRegistry {
    dimension: usize,
    alpha: f32,
    indexes: Mutex<FxHashMap<String, Arc<HybridIndex>>>,
}

impl IndexRegistry {
    pub fn new(config: &HybridConfig) -> Self {
        Self {
            dimension: config.dimension,
            alpha: config.alpha,
            indexes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Fetch the index named `name`, creating it on first access.
    pub fn open(&self, name: &str) -> Arc<HybridIndex> {
        let mut indexes = self.indexes.lock();
        indexes
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(HybridIndex::new(name, self.dimension, self.alpha)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseEncoder;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn upsert_assigns_ids_and_query_ranks() {
        let index = HybridIndex::new("test", 4, 0.5);
        let encoder = SparseEncoder::new();
        encoder.fit(["the sky is blue", "grass is green"]);

        let outcome = index.upsert(vec![
            PendingChunk::new("the sky is blue", encoder.encode("the sky is blue"), unit(4, 0)),
            PendingChunk::new("grass is green", encoder.encode("grass is green"), unit(4, 1)),
        ]);
        assert_eq!(outcome.stored.len(), 2);
        assert!(outcome.rejected.is_empty());
        assert_eq!(index.len(), 2);

        let hits = index.query(&encoder.encode("sky blue"), &unit(4, 0), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "the sky is blue");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn query_with_k_zero_or_empty_index_is_empty() {
        let index = HybridIndex::new("test", 4, 0.5);
        let sparse = SparseVector::default();
        assert!(index.query(&sparse, &unit(4, 0), 0).is_empty());
        assert!(index.query(&sparse, &unit(4, 0), 10).is_empty());

        index.upsert(vec![PendingChunk::new("text", sparse.clone(), unit(4, 0))]);
        assert!(index.query(&sparse, &unit(4, 0), 0).is_empty());
    }

    #[test]
    fn dimension_mismatch_rejects_chunk_but_not_batch() {
        let index = HybridIndex::new("test", 4, 0.5);
        let outcome = index.upsert(vec![
            PendingChunk::new("good", SparseVector::default(), unit(4, 0)),
            PendingChunk::new("bad", SparseVector::default(), vec![1.0; 3]),
            PendingChunk::new("also good", SparseVector::default(), unit(4, 1)),
        ]);
        assert_eq!(outcome.stored.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert!(matches!(
            outcome.rejected[0],
            RagError::InvalidVector {
                expected: 4,
                actual: 3
            }
        ));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn reupserting_an_id_is_idempotent_for_rankings() {
        let index = HybridIndex::new("test", 4, 1.0);
        index.upsert(vec![
            PendingChunk::new("first", SparseVector::default(), unit(4, 0)).with_id("a"),
            PendingChunk::new("second", SparseVector::default(), unit(4, 0)).with_id("b"),
        ]);

        let before: Vec<String> = index
            .query(&SparseVector::default(), &unit(4, 0), 2)
            .into_iter()
            .map(|hit| hit.id)
            .collect();

        // Same id, same content: rankings must not shift.
        index.upsert(vec![
            PendingChunk::new("second", SparseVector::default(), unit(4, 0)).with_id("b"),
        ]);
        let after: Vec<String> = index
            .query(&SparseVector::default(), &unit(4, 0), 2)
            .into_iter()
            .map(|hit| hit.id)
            .collect();

        assert_eq!(before, after);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let index = HybridIndex::new("test", 4, 1.0);
        // Identical vectors: identical scores for any query.
        index.upsert(vec![
            PendingChunk::new("earlier", SparseVector::default(), unit(4, 2)).with_id("x"),
            PendingChunk::new("later", SparseVector::default(), unit(4, 2)).with_id("y"),
        ]);
        let hits = index.query(&SparseVector::default(), &unit(4, 2), 2);
        assert_eq!(hits[0].text, "earlier");
        assert_eq!(hits[1].text, "later");
    }

    #[test]
    fn raising_dense_similarity_never_lowers_rank() {
        let encoder = SparseEncoder::new();
        encoder.fit(["alpha beta", "gamma delta"]);
        let sparse_a = encoder.encode("alpha beta");
        let sparse_b = encoder.encode("gamma delta");
        let query_sparse = encoder.encode("alpha");
        let query_dense = unit(4, 0);

        // Candidate "a" starts dense-orthogonal to the query.
        let rank_of_a = |a_dense: Vec<f32>| -> usize {
            let index = HybridIndex::new("test", 4, 0.5);
            index.upsert(vec![
                PendingChunk::new("a", sparse_a.clone(), a_dense).with_id("a"),
                PendingChunk::new("b", sparse_b.clone(), unit(4, 0)).with_id("b"),
            ]);
            index
                .query(&query_sparse, &query_dense, 2)
                .iter()
                .position(|hit| hit.id == "a")
                .unwrap()
        };

        let low = rank_of_a(unit(4, 3));
        let high = rank_of_a(unit(4, 0));
        assert!(high <= low, "higher dense similarity lowered the rank");
    }

    #[test]
    fn registry_creates_indexes_lazily_and_returns_the_same_handle() {
        let registry = IndexRegistry::new(&HybridConfig::default().with_dimension(8));
        let first = registry.open("hybrid-search");
        let second = registry.open("hybrid-search");
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(first.dimension(), 8);
        assert!(first.is_empty());

        let other = registry.open("another");
        assert!(!std::sync::Arc::ptr_eq(&first, &other));
    }
}
