//! Text embedding: the provider trait and a checked batch helper.

use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::error::{RagError, Result};
use crate::timeout::with_timeout;

/// Turns text into fixed-length vectors.
///
/// Chunks and questions must go through the same provider: their vectors are
/// only comparable when they share a model and a dimensionality.
///
/// ```rust,ignore
/// let embedding = provider.embed("SEC. 4. GRANTS.").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order.
    ///
    /// Falls back to one [`embed`](EmbeddingProvider::embed) call per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Largest number of texts sent in one [`embed_batch`] request.
    ///
    /// The default of 1 makes indexing call [`embed`] once per chunk. Backends
    /// with a native batch endpoint should raise it.
    ///
    /// [`embed`]: EmbeddingProvider::embed
    /// [`embed_batch`]: EmbeddingProvider::embed_batch
    fn max_batch_size(&self) -> usize {
        1
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Embed `texts` and verify the provider kept its contract: one vector per
/// text, each of [`EmbeddingProvider::dimensions`] length.
///
/// Texts go out in requests of at most
/// [`max_batch_size`](EmbeddingProvider::max_batch_size), and `limit` bounds
/// each request rather than the whole run.
pub(crate) async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    limit: Duration,
) -> Result<Vec<Vec<f32>>> {
    let expected = provider.dimensions();
    let mut vectors = Vec::with_capacity(texts.len());

    for request in texts.chunks(provider.max_batch_size().max(1)) {
        let batch = match request {
            [text] => vec![with_timeout("embedding", limit, provider.embed(text)).await?],
            _ => with_timeout("embedding", limit, provider.embed_batch(request)).await?,
        };

        if batch.len() != request.len() {
            error!(expected = request.len(), actual = batch.len(), "embedding count mismatch");
            return Err(contract_violation(
                provider,
                format!(
                    "expected {} embeddings, provider returned {}",
                    request.len(),
                    batch.len()
                ),
            ));
        }
        if let Some(bad) = batch.iter().find(|v| v.len() != expected) {
            error!(expected, actual = bad.len(), "embedding dimension mismatch");
            return Err(contract_violation(
                provider,
                format!("expected {expected}-dimensional embedding, got {}", bad.len()),
            ));
        }
        vectors.extend(batch);
    }

    Ok(vectors)
}

fn contract_violation(provider: &dyn EmbeddingProvider, message: String) -> RagError {
    RagError::EmbeddingError { provider: provider.name().to_string(), message }
}
