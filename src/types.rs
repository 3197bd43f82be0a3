//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the pipeline returns [`RagError`]. Per-source
//! errors during batch ingestion are caught at the source boundary (see
//! [`crate::ingest`]) and never abort sibling sources; query-time errors
//! propagate directly to the caller. There are no automatic retries anywhere
//! in the core; retrying is a caller-level concern.

use std::fmt;

/// Errors produced by the hybrid retrieval pipeline.
//
// NOTE: `Display`/`Error` are implemented by hand rather than via
// `#[derive(thiserror::Error)]`. thiserror unconditionally treats any field
// literally named `source` as the error-source field and requires it to
// implement `std::error::Error`; the `Extraction { source: String, .. }`
// variant (whose field name is fixed by the spec) is a plain payload string,
// not a nested error, so the derive cannot be used. These impls reproduce the
// exact messages the derive would have generated.
#[derive(Debug)]
pub enum RagError {
    /// The source identifier is neither a `.pdf` path nor an http(s) URL.
    ///
    /// Raised before any shared state is touched; never retried.
    UnsupportedSource(String),

    /// The source adapter failed to produce text (including zero-length
    /// extraction). Isolated per source; the batch continues.
    Extraction { source: String, message: String },

    /// Normalization yielded zero usable sentences. Treated like an
    /// extraction failure by the ingestion coordinator.
    EmptyContent,

    /// A chunk's dense vector does not match the configured dimension.
    /// Fatal for that chunk, not for the batch.
    InvalidVector { expected: usize, actual: usize },

    /// The embedding collaborator failed.
    Embedding(String),

    /// The generative collaborator failed at query time. Surfaced to the
    /// caller verbatim, no automatic retry.
    Generation(String),
}

impl fmt::Display for RagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RagError::UnsupportedSource(s) => write!(
                f,
                "unsupported source '{s}': expected a .pdf path or an http(s) URL"
            ),
            RagError::Extraction { source, message } => {
                write!(f, "extraction failed for '{source}': {message}")
            }
            RagError::EmptyContent => write!(f, "no usable sentences after normalization"),
            RagError::InvalidVector { expected, actual } => write!(
                f,
                "dense vector dimension mismatch: expected {expected}, got {actual}"
            ),
            RagError::Embedding(s) => write!(f, "embedding failed: {s}"),
            RagError::Generation(s) => write!(f, "generation failed: {s}"),
        }
    }
}

impl std::error::Error for RagError {}

impl RagError {
    /// Convenience constructor for extraction failures.
    pub fn extraction(source: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Extraction {
            source: source.into(),
            message: message.into(),
        }
    }
}
