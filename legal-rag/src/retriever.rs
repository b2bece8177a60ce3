//! Question retrieval: embed the question, then search the index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::{Query, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::timeout::with_timeout;
use crate::vectorstore::VectorIndex;

/// Retrieval breadth and deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOptions {
    /// Number of chunks returned by [`Retriever::retrieve`].
    pub k: usize,
    /// Deadline for embedding the question.
    pub embedding_timeout: Duration,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { k: 10, embedding_timeout: Duration::from_secs(30) }
    }
}

/// Finds the chunks most relevant to a question.
///
/// `k` favours recall; precision is left to the answer generator.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    options: RetrievalOptions,
}

impl Retriever {
    /// Create a retriever over `index`, embedding questions with `embedder`.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        options: RetrievalOptions,
    ) -> Self {
        Self { embedder, index, options }
    }

    /// The configured retrieval options.
    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Retrieve the configured number of chunks for `question`.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve_k`].
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.retrieve_k(question, self.options.k).await
    }

    /// Retrieve the `k` chunks most similar to `question`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if the provider fails or returns a
    ///   vector whose dimensionality differs from the index's
    /// - [`RagError::TimeoutError`] if embedding exceeds the deadline
    /// - [`RagError::EmptyIndexError`] if the index has not been populated
    pub async fn retrieve_k(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        let embedding = with_timeout(
            "embedding",
            self.options.embedding_timeout,
            self.embedder.embed(question),
        )
        .await
        .inspect_err(|e| error!(error = %e, "question embedding failed"))?;

        if let Some(expected) = self.index.dimensions().await {
            if embedding.len() != expected {
                error!(
                    expected,
                    actual = embedding.len(),
                    "question embedding has wrong dimension"
                );
                return Err(RagError::EmbeddingError {
                    provider: self.embedder.name().to_string(),
                    message: format!(
                        "question embedding has {} dimensions, index was built with {expected}",
                        embedding.len()
                    ),
                });
            }
        }

        let hits = self.index.search(&embedding, k).await?;
        debug!(k, hit_count = hits.len(), "retrieved chunks");

        Ok(RetrievalResult { query: Query { text: question.to_string(), embedding }, hits })
    }
}
