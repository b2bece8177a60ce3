//! Data types for documents, chunks, index entries, and results.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::generation::NOT_IN_CONTEXT;

/// An ordered block of raw text produced by a document loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextBlock {
    /// One-based page number the block came from.
    pub page: u32,
    /// The extracted text.
    pub text: String,
}

impl TextBlock {
    /// Create a block for `page`.
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self { page, text: text.into() }
    }
}

/// The byte range of [`Document::text`] that came from one page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpan {
    /// One-based page number.
    pub page: u32,
    /// First byte of the page in the document text.
    pub start: usize,
    /// One past the last byte of the page, including the block separator.
    pub end: usize,
}

/// A loaded source document. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The full text, blocks joined by `\n`.
    pub text: String,
    /// Page layout over `text`, in document order.
    pub pages: Vec<PageSpan>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Assemble a document from loader blocks.
    ///
    /// Blocks are joined with a single newline; each page span covers its
    /// block plus the separator that follows it.
    pub fn from_blocks(id: impl Into<String>, blocks: impl IntoIterator<Item = TextBlock>) -> Self {
        let mut text = String::new();
        let mut pages: Vec<PageSpan> = Vec::new();

        for (i, block) in blocks.into_iter().enumerate() {
            if i > 0 {
                text.push('\n');
                if let Some(last) = pages.last_mut() {
                    last.end = text.len();
                }
            }
            let start = text.len();
            text.push_str(&block.text);
            pages.push(PageSpan { page: block.page, start, end: text.len() });
        }

        Self { id: id.into(), text, pages, source_uri: None }
    }

    /// Build a single-page document from plain text.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_blocks(id, [TextBlock::new(1, text)])
    }

    /// Attach the URI the document was loaded from.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Page numbers touched by the byte range, sorted and de-duplicated.
    pub fn pages_in(&self, range: &Range<usize>) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .pages
            .iter()
            .filter(|span| span.start < range.end && range.start < span.end)
            .map(|span| span.page)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// A contiguous, identified span of document text used as a retrieval unit.
///
/// `text` is the leading overlap followed by the span the chunk owns. The
/// owned spans of all chunks of a document partition its text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier, `{document_id}_{ordinal}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of the chunk in document order, starting at zero.
    pub ordinal: usize,
    /// Overlap prefix plus owned text.
    pub text: String,
    /// Byte length of the overlap prefix at the start of `text`.
    pub overlap: usize,
    /// Byte range of the document owned by this chunk.
    pub span: Range<usize>,
    /// Pages the chunk text was taken from.
    pub pages: Vec<u32>,
    /// Section marker heading the chunk, e.g. `SEC. 4.`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Chunk {
    /// The text owned by this chunk, without the leading overlap.
    pub fn core_text(&self) -> &str {
        &self.text[self.overlap..]
    }

    /// The overlap shared with the preceding chunk.
    pub fn overlap_text(&self) -> &str {
        &self.text[..self.overlap]
    }
}

/// A [`Chunk`] paired with its embedding. Owned by a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// A question together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// The question as asked.
    pub text: String,
    /// Embedding computed for this query only.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// The ranked chunks retrieved for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The query that was searched.
    pub query: Query,
    /// Hits ordered by descending score.
    pub hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// The retrieved chunks in rank order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    /// Consume the result, keeping only the chunks in rank order.
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.hits.into_iter().map(|hit| hit.chunk).collect()
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns `true` when nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// The outcome of answering one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    /// The question as asked.
    pub question: String,
    /// The generated answer, or the `Not in context` sentinel.
    pub answer: String,
    /// IDs of the chunks supplied to the model, in rank order.
    pub source_chunk_ids: Vec<String>,
}

impl AnswerResult {
    /// Returns `true` if the document did not contain the answer.
    pub fn is_not_in_context(&self) -> bool {
        self.answer == NOT_IN_CONTEXT
    }
}
