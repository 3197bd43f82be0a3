//! Sparse lexical encoding with corpus-wide term statistics.
//!
//! [`SparseEncoder`] owns the corpus statistics (document frequencies,
//! document count, token totals) behind a lock and maps text to a
//! [`SparseVector`] with BM25-style weights: rarer terms weigh more, repeated
//! in-chunk terms weigh more with saturation. `fit` is cumulative: repeated
//! calls accumulate onto previously learned statistics and never reset them.
//!
//! `encode` is deterministic against the statistics current at call time, but
//! not reproducible once later `fit` calls land; callers needing reproducible
//! vectors must encode before further fits, or re-encode.

use std::hash::{Hash, Hasher};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};

/// BM25 term-frequency saturation parameter.
const K1: f32 = 1.5;
/// BM25 length-normalization parameter.
const B: f32 = 0.75;

/// Sparse lexical vector: `(term-id, weight)` pairs sorted by term id.
///
/// Term ids are stable hashes of lowercased tokens, so vectors produced in
/// different processes agree on ids for the same vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector(Vec<(u64, f32)>);

impl SparseVector {
    /// Dot product over matching term ids (both sides sorted).
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut score = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a_id, a_w) = self.0[i];
            let (b_id, b_w) = other.0[j];
            match a_id.cmp(&b_id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    score += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        score
    }

    /// Number of non-zero terms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the vector has no terms.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The weight stored for `term_id`, if present.
    pub fn weight(&self, term_id: u64) -> Option<f32> {
        self.0
            .binary_search_by_key(&term_id, |(id, _)| *id)
            .ok()
            .map(|idx| self.0[idx].1)
    }

    /// Borrow the underlying `(term-id, weight)` pairs.
    pub fn entries(&self) -> &[(u64, f32)] {
        &self.0
    }
}

/// Corpus-wide lexical statistics accumulated by [`SparseEncoder::fit`].
#[derive(Debug, Default)]
struct CorpusStats {
    /// Documents containing each term at least once.
    doc_freq: FxHashMap<u64, u32>,
    /// Total documents fitted so far.
    doc_count: u64,
    /// Total tokens across all fitted documents, for average length.
    token_count: u64,
}

impl CorpusStats {
    fn avg_doc_len(&self) -> f32 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.token_count as f32 / self.doc_count as f32
        }
    }
}

/// Maps chunks to sparse lexical vectors using shared corpus statistics.
///
/// The statistics are guarded by a read-write lock: `fit` serializes behind
/// the write lock, `encode` reads concurrently. During batch ingestion the
/// coordinator routes all `fit` calls through a single writer task, so
/// interleavings from concurrent sources cannot lose counter updates.
#[derive(Debug, Default)]
pub struct SparseEncoder {
    stats: RwLock<CorpusStats>,
}

impl SparseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate term statistics for the given chunks, one document each.
    ///
    /// Cumulative: counts for terms seen in earlier calls only ever grow.
    pub fn fit<'a>(&self, chunks: impl IntoIterator<Item = &'a str>) {
        let mut stats = self.stats.write();
        for chunk in chunks {
            let mut seen = FxHashSet::default();
            let mut tokens = 0u64;
            for term in tokenize(chunk) {
                tokens += 1;
                seen.insert(term);
            }
            if tokens == 0 {
                continue;
            }
            stats.doc_count += 1;
            stats.token_count += tokens;
            for term in seen {
                *stats.doc_freq.entry(term).or_insert(0) += 1;
            }
        }
    }

    /// Encode text into a sparse vector under the current statistics.
    ///
    /// Weights decrease monotonically with a term's document frequency and
    /// increase (with saturation) with its in-chunk frequency. Returns an
    /// empty vector while the corpus is empty.
    pub fn encode(&self, text: &str) -> SparseVector {
        let stats = self.stats.read();
        if stats.doc_count == 0 {
            return SparseVector::default();
        }

        let mut term_freq = FxHashMap::default();
        let mut doc_len = 0u32;
        for term in tokenize(text) {
            doc_len += 1;
            *term_freq.entry(term).or_insert(0u32) += 1;
        }
        if doc_len == 0 {
            return SparseVector::default();
        }

        let avg_len = stats.avg_doc_len();
        let n = stats.doc_count as f32;
        let mut entries: Vec<(u64, f32)> = term_freq
            .into_iter()
            .map(|(term, tf)| {
                let df = stats.doc_freq.get(&term).copied().unwrap_or(0) as f32;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let tf = tf as f32;
                let saturation =
                    tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * doc_len as f32 / avg_len));
                (term, idf * saturation)
            })
            .collect();
        entries.sort_unstable_by_key(|(term, _)| *term);
        SparseVector(entries)
    }

    /// Number of documents fitted so far.
    pub fn documents_seen(&self) -> u64 {
        self.stats.read().doc_count
    }

    /// Documents containing the given token.
    pub fn document_frequency(&self, token: &str) -> u32 {
        self.stats
            .read()
            .doc_freq
            .get(&term_id(token))
            .copied()
            .unwrap_or(0)
    }
}

/// Stable id for a lowercased token.
pub fn term_id(token: &str) -> u64 {
    let mut hasher = FxHasher::default();
    token.hash(&mut hasher);
    hasher.finish()
}

/// Lowercase and split on non-alphanumeric boundaries.
fn tokenize(text: &str) -> impl Iterator<Item = u64> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| term_id(&token.to_lowercase()))
}
