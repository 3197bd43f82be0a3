//! Retrieval-augmented answering.
//!
//! [`QueryPipeline`] encodes a question with both signals, retrieves the
//! top-k chunks from the hybrid index, and hands the assembled context to the
//! generative collaborator. With an empty retrieval result it short-circuits
//! to a fixed no-context answer and never calls the generator.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::HybridConfig;
use crate::embed::Embedder;
use crate::generate::Generator;
use crate::index::HybridIndex;
use crate::sparse::SparseEncoder;
use crate::types::RagError;

/// Fixed answer returned when retrieval finds nothing.
pub const NO_CONTEXT_ANSWER: &str = "No relevant information found in the database.";

/// Outcome of a question.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Retrieval came back empty; the generator was not consulted.
    NoContext,
    /// The generative collaborator's output, verbatim.
    Generated(String),
}

impl Answer {
    /// The answer text to show a caller.
    pub fn text(&self) -> &str {
        match self {
            Answer::NoContext => NO_CONTEXT_ANSWER,
            Answer::Generated(text) => text,
        }
    }
}

/// Question-answering pipeline over a hybrid index.
pub struct QueryPipeline {
    sparse: Arc<SparseEncoder>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<HybridIndex>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        sparse: Arc<SparseEncoder>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<HybridIndex>,
        config: &HybridConfig,
    ) -> Self {
        Self {
            sparse,
            embedder,
            generator,
            index,
            top_k: config.top_k,
        }
    }

    /// Answer a natural-language question against the index.
    ///
    /// The question is encoded read-only (`encode`, never `fit`; questions
    /// must not perturb corpus statistics). Generation failures propagate to
    /// the caller as [`RagError::Generation`]; there is no retry.
    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        let sparse_query = self.sparse.encode(question);
        let dense_query = self.embedder.embed(question).await?;

        let hits = self.index.query(&sparse_query, &dense_query, self.top_k);
        if hits.is_empty() {
            debug!("retrieval empty, returning fixed answer");
            return Ok(Answer::NoContext);
        }
        debug!(
            hits = hits.len(),
            top_score = f64::from(hits[0].score),
            "retrieved context"
        );

        let context = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("{context}\nQuestion: {question}\nAnswer:");
        let completion = self.generator.complete(&prompt).await?;
        Ok(Answer::Generated(completion))
    }
}
