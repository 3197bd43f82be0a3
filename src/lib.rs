//! # ragfuse: Hybrid Lexical+Semantic Retrieval Pipeline
//!
//! ragfuse ingests documents (web pages, PDFs), indexes them as sentence
//! chunks with dual sparse/dense representations, and answers questions by
//! fusing both signals at query time and prompting a generative model with
//! the retrieved context.
//!
//! ```text
//! sources ──► ingest::IngestionCoordinator ──► normalize::Sentences
//!                      │                              │
//!                      │            ┌─────────────────┤
//!                      │            ▼                 ▼
//!                      │   sparse::SparseEncoder   embed::Embedder
//!                      │            │                 │
//!                      │            └───────┬─────────┘
//!                      ▼                    ▼
//!              per-source workers ──► single writer ──► index::HybridIndex
//!
//! question ──► query::QueryPipeline ──► index::HybridIndex ──► context
//!                                              │
//!                                              ▼
//!                                    generate::Generator ──► answer
//! ```
//!
//! ## Design points
//!
//! - **Cumulative corpus statistics**: [`sparse::SparseEncoder::fit`] only
//!   ever accumulates; earlier batches are never discarded.
//! - **Serialized shared-state writes**: during ingestion, statistics update
//!   and index upsert run on a single writer task fed by a queue from the
//!   parallel extraction workers.
//! - **Fusion weight as configuration**: [`config::HybridConfig::alpha`]
//!   balances lexical exactness against semantic similarity (default 0.5).
//! - **Collaborator seams**: embedding ([`embed::Embedder`]), generation
//!   ([`generate::Generator`]) and source extraction
//!   ([`extract::SourceExtractor`]) are traits; deterministic in-process
//!   implementations ship for offline use and tests.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragfuse::prelude::*;
//!
//! # struct MyGenerator;
//! # #[async_trait::async_trait]
//! # impl ragfuse::generate::Generator for MyGenerator {
//! #     async fn complete(&self, _: &str) -> Result<String, ragfuse::types::RagError> {
//! #         Ok(String::new())
//! #     }
//! # }
//! # async fn example() -> Result<(), ragfuse::types::RagError> {
//! let config = HybridConfig::from_env();
//! let registry = IndexRegistry::new(&config);
//! let index = registry.open(&config.index_name);
//! let sparse = Arc::new(SparseEncoder::new());
//! let embedder = Arc::new(HashEmbedder::new(config.dimension));
//!
//! let coordinator = IngestionCoordinator::new(
//!     Arc::new(DocumentExtractor::new()?),
//!     embedder.clone(),
//!     sparse.clone(),
//!     index.clone(),
//!     &config,
//! );
//! let report = coordinator
//!     .ingest_batch(&["https://example.com/article", "paper.pdf"])
//!     .await;
//! println!("{} sources indexed", report.succeeded());
//!
//! let pipeline = QueryPipeline::new(
//!     sparse,
//!     embedder,
//!     Arc::new(MyGenerator),
//!     index,
//!     &config,
//! );
//! let answer = pipeline.answer("What is the article about?").await?;
//! println!("{}", answer.text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embed;
pub mod extract;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod normalize;
#[cfg(feature = "rig")]
pub mod providers;
pub mod query;
pub mod sparse;
pub mod types;

/// One-stop imports for the common pipeline setup.
pub mod prelude {
    pub use crate::config::HybridConfig;
    pub use crate::embed::{Embedder, HashEmbedder};
    pub use crate::extract::{DocumentExtractor, SourceExtractor, SourceRef};
    pub use crate::generate::Generator;
    pub use crate::index::{HybridIndex, IndexRegistry, PendingChunk, ScoredChunk};
    pub use crate::ingest::{IngestionCoordinator, IngestionReport};
    pub use crate::normalize::Sentences;
    pub use crate::query::{Answer, QueryPipeline, NO_CONTEXT_ANSWER};
    pub use crate::sparse::{SparseEncoder, SparseVector};
    pub use crate::types::RagError;
}
