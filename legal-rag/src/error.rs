//! Error types for the `legal-rag` crate.

use thiserror::Error;

/// Errors that can occur while loading, indexing, or answering questions
/// against a document.
///
/// A question the document cannot answer is *not* an error: it produces an
/// [`AnswerResult`](crate::AnswerResult) carrying the
/// [`NOT_IN_CONTEXT`](crate::NOT_IN_CONTEXT) sentinel.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document could not be read or parsed.
    #[error("Load error: {0}")]
    LoadError(String),

    /// Splitting produced no chunks (empty or malformed document).
    #[error("Split error: {0}")]
    SplitError(String),

    /// The embedding provider failed or returned an unusable vector.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A collaborator call exceeded its deadline.
    #[error("Timeout error: {operation} did not complete within {timeout_ms} ms")]
    TimeoutError {
        /// The operation that timed out (`embedding` or `generation`).
        operation: String,
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// A search was issued before anything was added to the index.
    #[error("Empty index error: search called before any entries were added")]
    EmptyIndexError,

    /// The generative model call failed.
    #[error("Generation error ({model}): {message}")]
    GenerationError {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected an operation.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndexError {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Build a [`RagError::TimeoutError`] for `operation`.
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::TimeoutError { operation: operation.into(), timeout_ms }
    }

    /// Returns `true` if the error is a collaborator timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutError { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
