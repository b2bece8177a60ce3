//! Configuration for the question-answering pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the pipeline.
///
/// Deserializes from partial input: any field left out keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters, overlap included.
    pub chunk_max_chars: usize,
    /// Number of characters shared between adjacent chunks.
    pub chunk_overlap_chars: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_k: usize,
    /// Expected embedding dimensionality. When set, the pipeline refuses an
    /// embedding provider that reports a different value.
    pub embedding_dimension: Option<usize>,
    /// Deadline for a single embedding call, in milliseconds.
    pub embedding_timeout_ms: u64,
    /// Deadline for a single generation call, in milliseconds.
    pub generation_timeout_ms: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1000,
            chunk_overlap_chars: 200,
            retrieval_k: 10,
            embedding_dimension: None,
            embedding_timeout_ms: 30_000,
            generation_timeout_ms: 120_000,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The embedding deadline as a [`Duration`].
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    /// The generation deadline as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_max_chars == 0`
    /// - `chunk_overlap_chars >= chunk_max_chars`
    /// - `retrieval_k == 0`
    /// - `embedding_dimension == Some(0)`
    /// - either timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_max_chars == 0 {
            return Err(RagError::ConfigError(
                "chunk_max_chars must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap_chars >= self.chunk_max_chars {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap_chars ({}) must be less than chunk_max_chars ({})",
                self.chunk_overlap_chars, self.chunk_max_chars
            )));
        }
        if self.retrieval_k == 0 {
            return Err(RagError::ConfigError("retrieval_k must be greater than zero".to_string()));
        }
        if self.embedding_dimension == Some(0) {
            return Err(RagError::ConfigError(
                "embedding_dimension must be greater than zero".to_string(),
            ));
        }
        if self.embedding_timeout_ms == 0 || self.generation_timeout_ms == 0 {
            return Err(RagError::ConfigError("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk length in characters.
    pub fn chunk_max_chars(mut self, chars: usize) -> Self {
        self.config.chunk_max_chars = chars;
        self
    }

    /// Set the overlap between adjacent chunks in characters.
    pub fn chunk_overlap_chars(mut self, chars: usize) -> Self {
        self.config.chunk_overlap_chars = chars;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn retrieval_k(mut self, k: usize) -> Self {
        self.config.retrieval_k = k;
        self
    }

    /// Pin the embedding dimensionality.
    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.config.embedding_dimension = Some(dimension);
        self
    }

    /// Set the embedding deadline in milliseconds.
    pub fn embedding_timeout_ms(mut self, ms: u64) -> Self {
        self.config.embedding_timeout_ms = ms;
        self
    }

    /// Set the generation deadline in milliseconds.
    pub fn generation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.generation_timeout_ms = ms;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
