//! Generative model collaborator boundary.
//!
//! The query pipeline hands a fully assembled prompt to a [`Generator`] and
//! returns its output verbatim. Upstream failures (quota, network, malformed
//! response) surface as [`RagError::Generation`] and are never retried by the
//! core.

use async_trait::async_trait;

use crate::types::RagError;

/// Maps a prompt to a text completion.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}
