//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], an append-only index backed
//! by a `Vec` behind a `tokio::sync::RwLock`. Search is a brute-force linear
//! scan, which is adequate for a single document of a few hundred chunks.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "InMemory";

/// An in-memory vector index using cosine similarity for search.
///
/// Entries are kept in insertion order. The lock gives single-writer,
/// many-reader access; [`freeze`](VectorIndex::freeze) closes the index to
/// further writes once it has been built.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(entries).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    state: RwLock<IndexState>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
    frozen: bool,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_error(message: impl Into<String>) -> RagError {
    RagError::VectorIndexError { backend: BACKEND.to_string(), message: message.into() }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.frozen {
            return Err(index_error("index is frozen; entries can no longer be added"));
        }

        let mut dimensions = state.dimensions;
        for entry in &entries {
            let len = entry.embedding.len();
            if len == 0 {
                return Err(index_error(format!(
                    "chunk '{}' has an empty embedding",
                    entry.chunk.id
                )));
            }
            match dimensions {
                Some(expected) if expected != len => {
                    return Err(index_error(format!(
                        "chunk '{}' has a {len}-dimensional embedding, index holds {expected}",
                        entry.chunk.id
                    )));
                }
                Some(_) => {}
                None => dimensions = Some(len),
            }
        }

        state.dimensions = dimensions;
        state.entries.extend(entries);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        if state.entries.is_empty() {
            return Err(RagError::EmptyIndexError);
        }
        if let Some(expected) = state.dimensions {
            if embedding.len() != expected {
                return Err(index_error(format!(
                    "query has {} dimensions, index holds {expected}",
                    embedding.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = cosine_similarity(&entry.embedding, embedding);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        let entries = &state.entries;
        scored.sort_by(|(ia, sa), (ib, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| entries[*ia].chunk.ordinal.cmp(&entries[*ib].chunk.ordinal))
                .then_with(|| ia.cmp(ib))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: entries[i].chunk.clone(), score })
            .collect())
    }

    async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }

    async fn freeze(&self) {
        self.state.write().await.frozen = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn entry(ordinal: usize, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: format!("doc_{ordinal}"),
                document_id: "doc".into(),
                ordinal,
                text: format!("chunk {ordinal}"),
                overlap: 0,
                span: 0..0,
                pages: vec![1],
                section: None,
            },
            embedding,
        }
    }

    #[test]
    fn cosine_of_orthogonal_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_before_add_is_empty_index_error() {
        let index = InMemoryVectorIndex::new();
        let err = index.search(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyIndexError));
    }

    #[tokio::test]
    async fn ranks_by_score_then_ordinal() {
        let index = InMemoryVectorIndex::new();
        index
            .add(vec![
                entry(0, vec![0.0, 1.0]),
                entry(1, vec![1.0, 0.0]),
                entry(2, vec![2.0, 0.0]),
                entry(3, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 4).await.unwrap();
        let ordinals: Vec<usize> = hits.iter().map(|h| h.chunk.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 0]);
    }

    #[tokio::test]
    async fn fewer_entries_than_k_returns_all() {
        let index = InMemoryVectorIndex::new();
        index.add(vec![entry(0, vec![1.0]), entry(1, vec![0.5])]).await.unwrap();
        assert_eq!(index.search(&[1.0], 10).await.unwrap().len(), 2);
        assert!(index.search(&[1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions_atomically() {
        let index = InMemoryVectorIndex::new();
        index.add(vec![entry(0, vec![1.0, 0.0])]).await.unwrap();
        let err = index.add(vec![entry(1, vec![1.0, 0.0]), entry(2, vec![1.0])]).await;
        assert!(matches!(err, Err(RagError::VectorIndexError { .. })));
        assert_eq!(index.len().await, 1);
        assert_eq!(index.dimensions().await, Some(2));
    }

    #[tokio::test]
    async fn frozen_index_rejects_add_but_serves_search() {
        let index = InMemoryVectorIndex::new();
        index.add(vec![entry(0, vec![1.0])]).await.unwrap();
        index.freeze().await;
        assert!(index.add(vec![entry(1, vec![1.0])]).await.is_err());
        assert_eq!(index.search(&[1.0], 1).await.unwrap().len(), 1);
    }
}
