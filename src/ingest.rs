//! Batch ingestion coordination.
//!
//! Each source moves through a per-source state machine:
//!
//! ```text
//! Pending -> Extracting -> Normalizing -> Encoding -> Upserted
//!                  \______________\____________\____> Failed (terminal, with cause)
//! ```
//!
//! Extraction, normalization and dense embedding have no shared state and run
//! concurrently across sources under a bounded worker pool. The sparse
//! corpus-statistics update (`fit`) and the index `upsert` are the two
//! shared-state operations; both are routed through a single writer task fed
//! by a queue from the workers, so statistics accumulate consistently and no
//! index write is lost to interleaving.
//!
//! One source's failure never aborts its siblings: failures are recorded per
//! source in the [`IngestionReport`] and the batch continues.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::config::HybridConfig;
use crate::embed::Embedder;
use crate::extract::{SourceExtractor, SourceRef};
use crate::index::{HybridIndex, PendingChunk};
use crate::normalize::Sentences;
use crate::sparse::SparseEncoder;
use crate::types::RagError;

/// Stage a source had reached when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Pending,
    Extracting,
    Normalizing,
    Encoding,
    Upserting,
}

/// Terminal outcome for one source in a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// The source was never processed (worker lost before completion).
    Pending,
    /// All surviving chunks were stored.
    Upserted {
        chunks_indexed: usize,
        /// Chunks rejected individually at upsert (dimension mismatch).
        chunks_rejected: usize,
    },
    /// Processing stopped at `stage` with the recorded cause.
    Failed { stage: IngestStage, error: String },
}

/// Per-source entry of an [`IngestionReport`], in input order.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_upserted(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Upserted { .. })
    }
}

/// Result of [`IngestionCoordinator::ingest_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub sources: Vec<SourceReport>,
}

impl IngestionReport {
    /// Sources that reached the `Upserted` state.
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.is_upserted()).count()
    }

    /// Sources that terminated in `Failed`.
    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    /// Total chunks stored across the batch.
    pub fn chunks_indexed(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.outcome {
                SourceOutcome::Upserted { chunks_indexed, .. } => chunks_indexed,
                _ => 0,
            })
            .sum()
    }
}

/// A fully encoded source handed to the serialized writer.
struct WriterJob {
    slot: usize,
    source: String,
    sentences: Vec<String>,
    dense: Vec<Vec<f32>>,
}

/// What the writer recorded for one job.
struct WriterResult {
    slot: usize,
    stored: usize,
    rejected: usize,
}

type WorkerResult = (usize, Result<(), (IngestStage, RagError)>);

/// Orchestrates per-source extraction, normalization, encoding and upsert
/// across many sources concurrently.
pub struct IngestionCoordinator {
    extractor: Arc<dyn SourceExtractor>,
    embedder: Arc<dyn Embedder>,
    sparse: Arc<SparseEncoder>,
    index: Arc<HybridIndex>,
    max_concurrency: usize,
}

impl IngestionCoordinator {
    pub fn new(
        extractor: Arc<dyn SourceExtractor>,
        embedder: Arc<dyn Embedder>,
        sparse: Arc<SparseEncoder>,
        index: Arc<HybridIndex>,
        config: &HybridConfig,
    ) -> Self {
        Self {
            extractor,
            embedder,
            sparse,
            index,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Process every source in the batch, isolating failures per source.
    ///
    /// The returned report has one entry per input, in input order.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn ingest_batch<S: AsRef<str>>(&self, sources: &[S]) -> IngestionReport {
        let mut reports: Vec<SourceReport> = sources
            .iter()
            .map(|source| SourceReport {
                source: source.as_ref().to_string(),
                outcome: SourceOutcome::Pending,
            })
            .collect();
        if reports.is_empty() {
            return IngestionReport { sources: reports };
        }

        let (job_tx, job_rx) = flume::unbounded::<WriterJob>();

        // Single writer: drains the queue, applies fit + encode + upsert in
        // arrival order. The only task that mutates shared state.
        let writer = {
            let sparse = Arc::clone(&self.sparse);
            let index = Arc::clone(&self.index);
            tokio::spawn(async move {
                let mut results = Vec::new();
                while let Ok(job) = job_rx.recv_async().await {
                    sparse.fit(job.sentences.iter().map(String::as_str));
                    let chunks: Vec<PendingChunk> = job
                        .sentences
                        .iter()
                        .zip(job.dense)
                        .enumerate()
                        .map(|(position, (text, dense))| {
                            PendingChunk::new(text.clone(), sparse.encode(text), dense)
                                .with_metadata(serde_json::json!({
                                    "source": job.source.clone(),
                                    "chunk_index": position,
                                }))
                        })
                        .collect();
                    let outcome = index.upsert(chunks);
                    for rejection in &outcome.rejected {
                        warn!(slot = job.slot, %rejection, "chunk rejected at upsert");
                    }
                    results.push(WriterResult {
                        slot: job.slot,
                        stored: outcome.stored.len(),
                        rejected: outcome.rejected.len(),
                    });
                }
                results
            })
        };

        // Bounded worker pool: extraction, normalization and dense encoding
        // are side-effect-free and run fully in parallel.
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        for (slot, source) in sources.iter().enumerate() {
            let raw = source.as_ref().to_string();
            let extractor = Arc::clone(&self.extractor);
            let embedder = Arc::clone(&self.embedder);
            let semaphore = Arc::clone(&semaphore);
            let job_tx = job_tx.clone();
            workers.spawn(async move {
                (
                    slot,
                    process_source(raw, extractor, embedder, semaphore, slot, job_tx).await,
                )
            });
        }
        drop(job_tx);

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((slot, Ok(()))) => {
                    debug!(slot, source = %reports[slot].source, "source encoded");
                }
                Ok((slot, Err((stage, error)))) => {
                    warn!(slot, source = %reports[slot].source, %error, "source failed");
                    reports[slot].outcome = SourceOutcome::Failed {
                        stage,
                        error: error.to_string(),
                    };
                }
                Err(join_err) => warn!(%join_err, "ingestion worker lost"),
            }
        }

        // All senders dropped: the writer drains the queue and returns.
        match writer.await {
            Ok(results) => {
                for result in results {
                    reports[result.slot].outcome = SourceOutcome::Upserted {
                        chunks_indexed: result.stored,
                        chunks_rejected: result.rejected,
                    };
                }
            }
            Err(join_err) => warn!(%join_err, "ingestion writer lost"),
        }

        // Anything still pending made it through encoding but never reached
        // the writer (queue closed early).
        for report in &mut reports {
            if matches!(report.outcome, SourceOutcome::Pending) {
                report.outcome = SourceOutcome::Failed {
                    stage: IngestStage::Upserting,
                    error: "writer task unavailable".to_string(),
                };
            }
        }

        IngestionReport { sources: reports }
    }
}

/// Drive one source through the state machine up to the writer hand-off.
async fn process_source(
    raw: String,
    extractor: Arc<dyn SourceExtractor>,
    embedder: Arc<dyn Embedder>,
    semaphore: Arc<Semaphore>,
    slot: usize,
    job_tx: flume::Sender<WriterJob>,
) -> Result<(), (IngestStage, RagError)> {
    // Unsupported sources fail before touching the pool or any shared state.
    let source_ref = SourceRef::parse(&raw).map_err(|err| (IngestStage::Pending, err))?;

    let Ok(_permit) = semaphore.acquire_owned().await else {
        return Err((
            IngestStage::Pending,
            RagError::extraction(raw, "worker pool shut down"),
        ));
    };

    let text = extractor
        .extract(&source_ref)
        .await
        .map_err(|err| (IngestStage::Extracting, err))?;

    let sentences =
        Sentences::new(&text).map_err(|err| (IngestStage::Normalizing, err))?;
    let sentence_texts: Vec<String> = sentences.iter().map(str::to_string).collect();

    let mut dense = Vec::with_capacity(sentence_texts.len());
    for sentence in &sentence_texts {
        let vector = embedder
            .embed(sentence)
            .await
            .map_err(|err| (IngestStage::Encoding, err))?;
        dense.push(vector);
    }

    debug!(
        slot,
        source = %source_ref.label(),
        chunks = sentence_texts.len(),
        "handing encoded source to writer"
    );
    job_tx
        .send(WriterJob {
            slot,
            source: source_ref.label(),
            sentences: sentence_texts,
            dense,
        })
        .map_err(|_| {
            (
                IngestStage::Upserting,
                RagError::extraction(raw, "writer queue closed"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use async_trait::async_trait;
    use rustc_hash::FxHashMap;

    /// Extractor backed by a fixed source -> text map.
    struct StaticExtractor {
        texts: FxHashMap<String, String>,
    }

    impl StaticExtractor {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                texts: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl SourceExtractor for StaticExtractor {
        async fn extract(&self, source: &SourceRef) -> Result<String, RagError> {
            let label = source.label();
            match self.texts.get(&label) {
                Some(text) if !text.is_empty() => Ok(text.clone()),
                Some(_) => Err(RagError::extraction(label, "zero-length extraction")),
                None => Err(RagError::extraction(label, "unknown source")),
            }
        }
    }

    fn coordinator(
        extractor: StaticExtractor,
        index: &Arc<HybridIndex>,
        sparse: &Arc<SparseEncoder>,
    ) -> IngestionCoordinator {
        let config = HybridConfig::default().with_dimension(64);
        IngestionCoordinator::new(
            Arc::new(extractor),
            Arc::new(HashEmbedder::new(64)),
            Arc::clone(sparse),
            Arc::clone(index),
            &config,
        )
    }

    #[tokio::test]
    async fn batch_processes_all_sources_and_updates_stats() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let extractor = StaticExtractor::new(&[
            ("https://example.com/sky", "The sky is blue. Clouds are white."),
            ("https://example.com/grass", "Grass is green."),
        ]);
        let coordinator = coordinator(extractor, &index, &sparse);

        let report = coordinator
            .ingest_batch(&["https://example.com/sky", "https://example.com/grass"])
            .await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.chunks_indexed(), 3);
        assert_eq!(index.len(), 3);
        assert_eq!(sparse.documents_seen(), 3);

        // Chunks carry their provenance.
        let embedder = HashEmbedder::new(64);
        let dense = embedder.embed("grass green").await.unwrap();
        let hits = index.query(&sparse.encode("grass green"), &dense, 1);
        assert_eq!(hits[0].metadata["source"], "https://example.com/grass");
    }

    #[tokio::test]
    async fn unsupported_source_fails_without_touching_shared_state() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let extractor = StaticExtractor::new(&[]);
        let coordinator = coordinator(extractor, &index, &sparse);

        let report = coordinator.ingest_batch(&["notes.txt"]).await;

        assert_eq!(report.failed(), 1);
        match &report.sources[0].outcome {
            SourceOutcome::Failed { stage, error } => {
                assert_eq!(*stage, IngestStage::Pending);
                assert!(error.contains("unsupported source"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(index.len(), 0);
        assert_eq!(sparse.documents_seen(), 0);
    }

    #[tokio::test]
    async fn one_failing_source_does_not_abort_siblings() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let extractor = StaticExtractor::new(&[
            ("empty.pdf", ""),
            ("https://example.com/ok", "This one works fine."),
        ]);
        let coordinator = coordinator(extractor, &index, &sparse);

        let report = coordinator
            .ingest_batch(&["empty.pdf", "https://example.com/ok"])
            .await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.sources[0].outcome,
            SourceOutcome::Failed {
                stage: IngestStage::Extracting,
                ..
            }
        ));
        assert!(report.sources[1].is_upserted());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn statistics_accumulate_across_batches() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let extractor = StaticExtractor::new(&[
            ("https://example.com/a", "Alpha beta gamma."),
            ("https://example.com/b", "Delta epsilon zeta."),
        ]);
        let coordinator = coordinator(extractor, &index, &sparse);

        coordinator.ingest_batch(&["https://example.com/a"]).await;
        let after_first = sparse.documents_seen();
        coordinator.ingest_batch(&["https://example.com/b"]).await;

        assert_eq!(after_first, 1);
        assert_eq!(sparse.documents_seen(), 2);
        // Terms learned in the first batch are still counted.
        assert_eq!(sparse.document_frequency("alpha"), 1);
    }

    #[tokio::test]
    async fn empty_batch_produces_empty_report() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let coordinator = coordinator(StaticExtractor::new(&[]), &index, &sparse);

        let report = coordinator.ingest_batch::<&str>(&[]).await;
        assert!(report.sources.is_empty());
        assert_eq!(report.succeeded(), 0);
    }

    #[tokio::test]
    async fn wide_batches_are_bounded_but_complete() {
        let sparse = Arc::new(SparseEncoder::new());
        let index = Arc::new(HybridIndex::new("test", 64, 0.5));
        let entries: Vec<(String, String)> = (0..16)
            .map(|i| {
                (
                    format!("https://example.com/page{i}"),
                    format!("Document number {i} talks about topic {i}."),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let coordinator = coordinator(StaticExtractor::new(&borrowed), &index, &sparse);

        let sources: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        let report = coordinator.ingest_batch(&sources).await;

        assert_eq!(report.succeeded(), 16);
        assert_eq!(index.len(), 16);
        assert_eq!(sparse.documents_seen(), 16);
    }
}
