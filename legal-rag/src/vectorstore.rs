//! Vector index trait for storing and searching chunk embeddings.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{Chunk, IndexEntry, SearchResult};
use crate::embedding::{EmbeddingProvider, embed_checked};
use crate::error::Result;

/// A store of [`IndexEntry`] values with similarity search.
///
/// The contract is defined by inputs and outputs only, so a brute-force
/// scan and an approximate nearest-neighbour structure are interchangeable
/// behind it.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(entries).await?;
/// index.freeze().await;
/// let hits = index.search(&query_embedding, 10).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. This is the only mutating operation.
    ///
    /// All entries must share the dimensionality of the first entry ever
    /// added.
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return the `k` chunks most similar to `embedding`.
    ///
    /// Results are ordered by descending score; equal scores are ordered by
    /// chunk ordinal, earliest first. An index holding fewer than `k`
    /// entries returns all of them.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyIndexError`](crate::RagError::EmptyIndexError) if
    /// nothing has been added.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Returns `true` if nothing has been added yet.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Dimensionality fixed by the first added entry.
    async fn dimensions(&self) -> Option<usize>;

    /// Make the index read-only. Later [`add`](VectorIndex::add) calls fail.
    ///
    /// Backends without a read-only mode may ignore this.
    async fn freeze(&self) {}
}

/// Embed `chunks` with `provider` and append them to `index`.
///
/// Each embedding request runs under `limit`. Returns the number of entries
/// added.
///
/// # Errors
///
/// Returns [`EmbeddingError`](crate::RagError::EmbeddingError) if the
/// provider fails, returns the wrong number of vectors, or returns a vector
/// whose length differs from [`EmbeddingProvider::dimensions`], and
/// [`TimeoutError`](crate::RagError::TimeoutError) if any one request
/// exceeds `limit`.
pub async fn index_chunks(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    limit: Duration,
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let embeddings = embed_checked(provider, &texts, limit).await?;

    let entries: Vec<IndexEntry> = chunks
        .iter()
        .cloned()
        .zip(embeddings)
        .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
        .collect();
    let count = entries.len();
    index.add(entries).await?;

    debug!(count, dimensions = provider.dimensions(), "indexed chunks");
    Ok(count)
}
