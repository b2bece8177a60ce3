//! # legal-rag
//!
//! Grounded question answering over a single legal document.
//!
//! ## Overview
//!
//! A document is loaded once, split into section-aligned chunks, embedded,
//! and held in an in-memory vector index. Each question is then embedded,
//! matched against the index, and answered by a generative model that may
//! use only the retrieved chunks. When those chunks do not contain the
//! answer the result is the literal [`NOT_IN_CONTEXT`] sentinel, which is a
//! successful answer and never an error.
//!
//! - [`SectionChunker`] - splits at `SEC.` markers with bounded overlap
//! - [`InMemoryVectorIndex`] - brute-force cosine search behind [`VectorIndex`]
//! - [`Retriever`] - embeds a question and fetches the top-k chunks
//! - [`AnswerGenerator`] - builds the grounded prompt and calls the model
//! - [`QaPipeline`] - ingest once, then `answer(question)`
//!
//! The embedding function and the generative model are injected through the
//! [`EmbeddingProvider`] and [`GenerativeModel`] traits. OpenAI-compatible
//! implementations live in [`openai`] behind the `openai` feature.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use legal_rag::{QaPipeline, RagConfig, load_document};
//! use legal_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
//!
//! let pipeline = QaPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .generative_model(Arc::new(OpenAIChatModel::from_env()?))
//!     .build()?;
//!
//! let document = load_document("hr3684.pdf".as_ref())?;
//! pipeline.ingest(&document).await?;
//!
//! let result = pipeline.answer("What is the maximum grant amount?").await?;
//! println!("{} (sources: {:?})", result.answer, result.source_chunk_ids);
//! ```
//!
//! ## Features
//!
//! - `pdf` (default) - [`PdfLoader`] via `lopdf`
//! - `openai` - OpenAI-compatible embeddings and chat completions via `reqwest`

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
mod timeout;
pub mod vectorstore;

pub use chunking::{Chunker, SectionChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    AnswerResult, Chunk, Document, IndexEntry, PageSpan, Query, RetrievalResult, SearchResult,
    TextBlock,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{
    AnswerGenerator, GenerativeModel, NOT_IN_CONTEXT, build_prompt, clean_chunk_text,
};
pub use inmemory::InMemoryVectorIndex;
#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
pub use loader::{DocumentLoader, TextLoader, load_document};
pub use pipeline::{PipelineState, QaPipeline, QaPipelineBuilder};
pub use retriever::{RetrievalOptions, Retriever};
pub use vectorstore::{VectorIndex, index_chunks};
