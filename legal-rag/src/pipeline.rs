//! Question-answering pipeline orchestrator.
//!
//! The [`QaPipeline`] owns the full workflow: ingest a document once
//! (split → embed → index → freeze), then answer questions one at a time
//! through a fixed two-stage machine (retrieve → generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use legal_rag::{QaPipeline, RagConfig};
//!
//! let pipeline = QaPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generative_model(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let result = pipeline.answer("What is the maximum grant amount?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, SectionChunker};
use crate::config::RagConfig;
use crate::document::{AnswerResult, Chunk, Document, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GenerativeModel};
use crate::inmemory::InMemoryVectorIndex;
use crate::loader::DocumentLoader;
use crate::retriever::{RetrievalOptions, Retriever};
use crate::vectorstore::{VectorIndex, index_chunks};

/// Where a question is in the pipeline.
///
/// Every question moves `Retrieving → Generating → Done`, each stage
/// exactly once. An error in either stage moves it to `Failed` and the
/// remaining stage never runs.
#[derive(Debug)]
pub enum PipelineState {
    /// Embedding the question and searching the index.
    Retrieving {
        /// The question being answered.
        question: String,
    },
    /// Asking the model to answer from the retrieved chunks.
    Generating {
        /// The question being answered.
        question: String,
        /// The chunks retrieved for it.
        retrieval: RetrievalResult,
    },
    /// Terminal: the question was answered (possibly with the sentinel).
    Done(AnswerResult),
    /// Terminal: a stage failed.
    Failed(RagError),
}

impl PipelineState {
    /// Short stage name for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Retrieving { .. } => "retrieving",
            Self::Generating { .. } => "generating",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    /// Convert a terminal state into the caller-facing result.
    ///
    /// # Errors
    ///
    /// Returns the carried error for `Failed`, and
    /// [`RagError::PipelineError`] for a state that has not finished.
    pub fn into_result(self) -> Result<AnswerResult> {
        match self {
            Self::Done(result) => Ok(result),
            Self::Failed(err) => Err(err),
            other => Err(RagError::PipelineError(format!(
                "pipeline stopped in non-terminal stage '{}'",
                other.stage()
            ))),
        }
    }
}

/// The question-answering pipeline.
///
/// Construct one via [`QaPipeline::builder()`], populate it with
/// [`ingest`](QaPipeline::ingest), then call [`answer`](QaPipeline::answer).
pub struct QaPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl QaPipeline {
    /// Create a new [`QaPipelineBuilder`].
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Build the index from `document`: split → embed → add → freeze.
    ///
    /// Returns the indexed chunks in ordinal order. The index is read-only
    /// afterwards.
    ///
    /// # Errors
    ///
    /// - [`RagError::SplitError`] if the document yields no chunks
    /// - [`RagError::EmbeddingError`] / [`RagError::TimeoutError`] if
    ///   embedding fails
    /// - [`RagError::VectorIndexError`] if the index was already built
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document)?;

        index_chunks(
            self.vector_index.as_ref(),
            self.embedding_provider.as_ref(),
            &chunks,
            self.config.embedding_timeout(),
        )
        .await
        .inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "indexing failed");
        })?;
        self.vector_index.freeze().await;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Load the file at `path` with `loader` and [`ingest`](QaPipeline::ingest) it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadError`] if loading fails, before anything is
    /// indexed, or any error from [`ingest`](QaPipeline::ingest).
    pub async fn load_and_ingest(
        &self,
        loader: &dyn DocumentLoader,
        path: &Path,
    ) -> Result<Vec<Chunk>> {
        let document = loader.load(path)?;
        self.ingest(&document).await
    }

    /// Answer one question.
    ///
    /// A question the document does not answer succeeds with the
    /// [`NOT_IN_CONTEXT`](crate::NOT_IN_CONTEXT) sentinel. Errors from either
    /// stage are returned unchanged.
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        self.run(question).await.into_result()
    }

    /// Run `question` through the pipeline and return its terminal state.
    pub async fn run(&self, question: &str) -> PipelineState {
        let retrieving = PipelineState::Retrieving { question: question.to_string() };
        let generating = self.advance(retrieving).await;
        let state = self.advance(generating).await;

        match &state {
            PipelineState::Done(result) => info!(
                source_count = result.source_chunk_ids.len(),
                not_in_context = result.is_not_in_context(),
                "question answered"
            ),
            PipelineState::Failed(err) => error!(error = %err, "question failed"),
            _ => {}
        }
        state
    }

    /// Perform the work of the current stage and return the next state.
    async fn advance(&self, state: PipelineState) -> PipelineState {
        match state {
            PipelineState::Retrieving { question } => match self.retriever.retrieve(&question).await
            {
                Ok(retrieval) => PipelineState::Generating { question, retrieval },
                Err(err) => PipelineState::Failed(err),
            },
            PipelineState::Generating { question, retrieval } => {
                let context = retrieval.into_chunks();
                match self.generator.generate(&question, &context).await {
                    Ok(result) => PipelineState::Done(result),
                    Err(err) => PipelineState::Failed(err),
                }
            }
            terminal => terminal,
        }
    }
}

/// Builder for constructing a [`QaPipeline`].
///
/// The embedding provider and generative model are required. The vector
/// index defaults to an [`InMemoryVectorIndex`] and the chunker to a
/// [`SectionChunker`] sized from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = QaPipeline::builder()
///     .config(config)
///     .embedding_provider(Arc::new(embedder))
///     .generative_model(Arc::new(model))
///     .vector_index(Arc::new(InMemoryVectorIndex::new()))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct QaPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generative_model: Option<Arc<dyn GenerativeModel>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl QaPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generative model.
    pub fn generative_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.generative_model = Some(model);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`QaPipeline`], validating configuration and required parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the config is invalid, a
    /// required part is missing, or the provider's dimensionality differs
    /// from `embedding_dimension`.
    pub fn build(self) -> Result<QaPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generative_model = self
            .generative_model
            .ok_or_else(|| RagError::ConfigError("generative_model is required".to_string()))?;

        if let Some(expected) = config.embedding_dimension {
            let actual = embedding_provider.dimensions();
            if actual != expected {
                return Err(RagError::ConfigError(format!(
                    "embedding provider '{}' produces {actual} dimensions, \
                     config expects {expected}",
                    embedding_provider.name()
                )));
            }
        }

        let vector_index =
            self.vector_index.unwrap_or_else(|| Arc::new(InMemoryVectorIndex::new()));
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(SectionChunker::new(config.chunk_max_chars, config.chunk_overlap_chars))
        });

        let retriever = Retriever::new(
            embedding_provider.clone(),
            vector_index.clone(),
            RetrievalOptions {
                k: config.retrieval_k,
                embedding_timeout: config.embedding_timeout(),
            },
        );
        let generator = AnswerGenerator::new(generative_model, config.generation_timeout());

        Ok(QaPipeline { config, embedding_provider, vector_index, chunker, retriever, generator })
    }
}
