//! Section-aware document chunking.
//!
//! This module provides the [`Chunker`] trait and [`SectionChunker`], which
//! splits legislative text at `SEC.` markers and falls back to paragraph,
//! sentence, and finally hard character boundaries for sections that exceed
//! the size cap.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A line that opens a new section: `SEC. 4.`, `SECTION 12`, `  SEC. 3A.`.
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?P<label>(?:SEC\.|SECTION)[ \t]*\d+[A-Za-z]?\.?)")
        .expect("section marker pattern is valid")
});

/// Sentence-level fallback boundaries, tried after paragraph breaks.
const SENTENCE_BREAKS: [&str; 6] = [". ", "; ", ": ", "? ", "! ", "\n"];

/// A strategy for splitting documents into chunks.
///
/// Implementations assign ordinals in document order and must keep the
/// owned spans of the returned chunks contiguous, so that concatenating
/// every [`Chunk::core_text`] reproduces the document text.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SplitError`] if the document yields no chunks.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Splits legislative text along section boundaries with bounded overlap.
///
/// Each section starts at a `SEC.`/`SECTION` marker at the start of a line
/// (text before the first marker forms a preamble section). A chunk's full
/// text, overlap included, never exceeds `max_chars` characters. When a
/// section does not fit, it is cut at the last paragraph break in the
/// window, else the last sentence break, else exactly at the character
/// limit. Breaks in the first half of the window are ignored so chunks do
/// not shrink to slivers. Every chunk after the first is prefixed with the
/// `overlap_chars` characters that precede it.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::{Chunker, SectionChunker};
///
/// let chunker = SectionChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct SectionChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl SectionChunker {
    /// Create a new `SectionChunker`.
    ///
    /// `overlap_chars` is clamped below `max_chars` so every chunk owns at
    /// least one character.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self { max_chars, overlap_chars: overlap_chars.min(max_chars - 1) }
    }

    /// Cut one section into owned spans and emit a chunk for each.
    fn split_section(
        &self,
        document: &Document,
        section: &Section,
        chunks: &mut Vec<Chunk>,
    ) {
        let text = document.text.as_str();
        let mut pos = section.range.start;

        while pos < section.range.end {
            let overlap_start = chars_before(text, pos, self.overlap_chars);
            let overlap_len = text[overlap_start..pos].chars().count();
            let budget = self.max_chars - overlap_len;

            let rest = &text[pos..section.range.end];
            let end = match rest.char_indices().nth(budget) {
                None => section.range.end,
                Some((window_len, _)) => pos + find_cut(&rest[..window_len], budget),
            };

            let ordinal = chunks.len();
            chunks.push(Chunk {
                id: format!("{}_{ordinal}", document.id),
                document_id: document.id.clone(),
                ordinal,
                text: text[overlap_start..end].to_string(),
                overlap: pos - overlap_start,
                span: pos..end,
                pages: document.pages_in(&(overlap_start..end)),
                section: section.label.clone(),
            });
            pos = end;
        }
    }
}

impl Default for SectionChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl Chunker for SectionChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.text.trim().is_empty() {
            return Err(RagError::SplitError(format!(
                "document '{}' contains no text",
                document.id
            )));
        }

        let sections = find_sections(&document.text);
        if sections.len() == 1 && sections[0].label.is_none() {
            warn!(document.id = %document.id, "no section markers found, using fixed-size chunks");
        }

        let mut chunks = Vec::new();
        for section in &sections {
            self.split_section(document, section, &mut chunks);
        }

        debug!(
            document.id = %document.id,
            section_count = sections.len(),
            chunk_count = chunks.len(),
            "split document"
        );
        Ok(chunks)
    }
}

/// A section of the document: its byte range and marker, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    range: Range<usize>,
    label: Option<String>,
}

/// Partition `text` into sections at marker lines.
///
/// A whitespace-only preamble is folded into the first section.
fn find_sections(text: &str) -> Vec<Section> {
    let mut starts: Vec<(usize, Option<String>)> = SECTION_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.name("label")?.as_str().to_string();
            Some((whole.start(), Some(label)))
        })
        .collect();

    match starts.first_mut() {
        None => starts.push((0, None)),
        Some(first) if text[..first.0].trim().is_empty() => first.0 = 0,
        Some(_) => starts.insert(0, (0, None)),
    }

    let mut sections = Vec::with_capacity(starts.len());
    for (i, (start, label)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(text.len(), |next| next.0);
        sections.push(Section { range: *start..end, label: label.clone() });
    }
    sections
}

/// Byte offset of the `n`th character before `pos`, or 0 if there are fewer.
fn chars_before(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}

/// Choose where to cut `window` (which holds `budget` characters).
///
/// Returns a byte length in `1..=window.len()`.
fn find_cut(window: &str, budget: usize) -> usize {
    let min = window.char_indices().nth(budget / 2).map_or(0, |(i, _)| i);

    if let Some(idx) = window.rfind("\n\n") {
        let cut = idx + 2;
        if cut > min {
            return cut;
        }
    }

    SENTENCE_BREAKS
        .iter()
        .filter_map(|brk| window.rfind(brk).map(|idx| idx + brk.len()))
        .filter(|cut| *cut > min)
        .max()
        .unwrap_or(window.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextBlock;

    fn rebuild(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::core_text).collect()
    }

    const BILL: &str = "A BILL\nTo establish a grant program.\n\
        SEC. 1. SHORT TITLE.\nThis Act may be cited as the Example Act.\n\
        SEC. 2. DEFINITIONS.\nIn this Act the term Secretary means the Secretary of Energy.\n\
        SEC. 3. GRANTS.\nThe amount of a grant may not exceed $25,000,000.\n";

    #[test]
    fn splits_at_section_markers() {
        let doc = Document::from_text("bill", BILL);
        let chunks = SectionChunker::new(1000, 0).chunk(&doc).unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].section, None);
        assert!(chunks[0].text.starts_with("A BILL"));
        assert_eq!(chunks[1].section.as_deref(), Some("SEC. 1."));
        assert!(chunks[3].text.starts_with("SEC. 3. GRANTS."));
        assert_eq!(rebuild(&chunks), BILL);
    }

    #[test]
    fn ids_and_ordinals_follow_document_order() {
        let doc = Document::from_text("bill", BILL);
        let chunks = SectionChunker::new(1000, 20).chunk(&doc).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.id, format!("bill_{i}"));
        }
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let doc = Document::from_text("bill", BILL);
        let chunks = SectionChunker::new(1000, 10).chunk(&doc).unwrap();

        assert_eq!(chunks[0].overlap, 0);
        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            assert_eq!(next.overlap_text().chars().count(), 10);
            assert!(prev.text.ends_with(next.overlap_text()));
        }
        assert_eq!(rebuild(&chunks), BILL);
    }

    #[test]
    fn long_section_respects_cap_and_prefers_paragraphs() {
        let para = "The Secretary shall carry out the program. ".repeat(5);
        let text = format!("SEC. 1. PROGRAM.\n{para}\n\n{para}\n\n{para}");
        let doc = Document::from_text("bill", text.as_str());
        let chunks = SectionChunker::new(300, 40).chunk(&doc).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 300, "chunk too long: {}", chunk.text.len());
            assert_eq!(chunk.section.as_deref(), Some("SEC. 1."));
        }
        assert!(chunks[0].core_text().ends_with("\n\n"));
        assert_eq!(rebuild(&chunks), text);
    }

    #[test]
    fn no_markers_degenerates_to_fixed_size_chunks() {
        let text = "x".repeat(250);
        let doc = Document::from_text("plain", text.as_str());
        let chunks = SectionChunker::new(100, 20).chunk(&doc).unwrap();

        assert_eq!(chunks[0].text.len(), 100);
        assert!(chunks.iter().all(|c| c.text.len() <= 100 && c.section.is_none()));
        assert!(chunks.iter().skip(1).all(|c| c.overlap == 20));
        assert_eq!(rebuild(&chunks), text);
    }

    #[test]
    fn short_section_is_emitted_whole() {
        let text = "SEC. 1. A.\nSEC. 2. B.\n";
        let doc = Document::from_text("tiny", text);
        let chunks = SectionChunker::new(100, 50).chunk(&doc).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].core_text(), "SEC. 1. A.\n");
        assert_eq!(chunks[1].core_text(), "SEC. 2. B.\n");
    }

    #[test]
    fn whitespace_preamble_is_folded_into_first_section() {
        let text = "\n\n  SEC. 1. TITLE.\nBody.";
        let doc = Document::from_text("bill", text);
        let chunks = SectionChunker::new(100, 0).chunk(&doc).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section.as_deref(), Some("SEC. 1."));
        assert_eq!(chunks[0].span, 0..text.len());
    }

    #[test]
    fn empty_document_is_a_split_error() {
        let doc = Document::from_text("empty", "  \n ");
        let err = SectionChunker::default().chunk(&doc).unwrap_err();
        assert!(matches!(err, RagError::SplitError(_)));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "§ é ".repeat(80);
        let doc = Document::from_text("utf8", text.as_str());
        let chunks = SectionChunker::new(50, 7).chunk(&doc).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 50));
        assert_eq!(rebuild(&chunks), text);
    }

    #[test]
    fn chunks_inherit_pages_they_span() {
        let doc = Document::from_blocks(
            "bill",
            [
                TextBlock::new(1, "SEC. 1. TITLE.\nShort."),
                TextBlock::new(2, "More of section one.\nSEC. 2. NEXT.\nBody."),
            ],
        );
        let chunks = SectionChunker::new(1000, 0).chunk(&doc).unwrap();
        assert_eq!(chunks[0].pages, vec![1, 2]);
        assert_eq!(chunks[1].pages, vec![2]);
    }

    #[test]
    fn find_cut_falls_back_to_hard_cut() {
        assert_eq!(find_cut("abcdefghij", 10), 10);
        assert_eq!(find_cut("abcdefg. hij", 12), 9);
        assert_eq!(find_cut("ab. cdefghijkl", 14), 14);
    }
}
