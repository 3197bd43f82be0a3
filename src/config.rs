//! Pipeline configuration.
//!
//! [`HybridConfig`] carries the tunables shared across the pipeline: the
//! fusion weight between lexical and semantic scores, retrieval depth, the
//! embedding dimension, ingestion parallelism, and the default index name.
//! Values can be set programmatically through the builder-style setters or
//! loaded from the environment (a `.env` file is honored via `dotenvy`).

use std::env;

/// Environment variable names recognized by [`HybridConfig::from_env`].
const ENV_ALPHA: &str = "RAGFUSE_ALPHA";
const ENV_TOP_K: &str = "RAGFUSE_TOP_K";
const ENV_DIMENSION: &str = "RAGFUSE_DIMENSION";
const ENV_MAX_CONCURRENCY: &str = "RAGFUSE_MAX_CONCURRENCY";
const ENV_INDEX: &str = "RAGFUSE_INDEX";

/// Configuration for the hybrid retrieval pipeline.
///
/// # Examples
///
/// ```
/// use ragfuse::config::HybridConfig;
///
/// let config = HybridConfig::default()
///     .with_alpha(0.7)
///     .with_top_k(8);
/// assert_eq!(config.top_k, 8);
/// ```
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Fusion weight: share of the fused score contributed by dense
    /// (semantic) similarity. `1.0 - alpha` goes to the sparse (lexical)
    /// signal. Clamped to `[0.0, 1.0]`.
    pub alpha: f32,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Dense vector dimension enforced by the index at upsert time.
    pub dimension: usize,
    /// Maximum number of sources processed in parallel during ingestion.
    pub max_concurrency: usize,
    /// Name of the default hybrid index, created lazily on first access.
    pub index_name: String,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            top_k: 4,
            dimension: 384,
            max_concurrency: 4,
            index_name: "hybrid-search".to_string(),
        }
    }
}

impl HybridConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset or unparseable. Reads a `.env` file if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Self {
            alpha: parse_var(ENV_ALPHA).unwrap_or(defaults.alpha),
            top_k: parse_var(ENV_TOP_K).unwrap_or(defaults.top_k),
            dimension: parse_var(ENV_DIMENSION).unwrap_or(defaults.dimension),
            max_concurrency: parse_var(ENV_MAX_CONCURRENCY)
                .unwrap_or(defaults.max_concurrency),
            index_name: env::var(ENV_INDEX).unwrap_or(defaults.index_name),
        }
        .normalized()
    }

    /// Set the dense/sparse fusion weight. Values outside `[0, 1]` are
    /// clamped.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self.normalized()
    }

    /// Set the retrieval depth used by the query pipeline.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the dense vector dimension the index enforces.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the ingestion worker-pool size. A value of zero is bumped to one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self.normalized()
    }

    /// Set the default index name.
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    fn normalized(mut self) -> Self {
        self.alpha = self.alpha.clamp(0.0, 1.0);
        self.max_concurrency = self.max_concurrency.max(1);
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_blended_fifty_fifty() {
        let config = HybridConfig::default();
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.dimension, 384);
        assert_eq!(config.index_name, "hybrid-search");
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(HybridConfig::default().with_alpha(1.7).alpha, 1.0);
        assert_eq!(HybridConfig::default().with_alpha(-0.3).alpha, 0.0);
    }

    #[test]
    fn zero_concurrency_is_bumped_to_one() {
        assert_eq!(
            HybridConfig::default().with_max_concurrency(0).max_concurrency,
            1
        );
    }
}
