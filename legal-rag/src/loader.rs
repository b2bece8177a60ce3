//! Document loaders.
//!
//! A loader turns a file into a [`Document`]: ordered text blocks with page
//! numbers. [`PdfLoader`] (feature `pdf`) extracts text page by page with
//! `lopdf`; [`TextLoader`] reads plain text, treating form feeds as page
//! breaks.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::{Document, TextBlock};
use crate::error::{RagError, Result};

/// Loads a document from a file path.
pub trait DocumentLoader: Send + Sync {
    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadError`] if the file cannot be read or parsed.
    fn load(&self, path: &Path) -> Result<Document>;
}

/// Document ID derived from the file name, e.g. `hr3684` for `hr3684.pdf`.
fn document_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_string()
}

/// Loads UTF-8 text files. A form feed (`\x0c`) starts a new page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::LoadError(format!("failed to read {}: {e}", path.display())))?;

        let blocks = content
            .split('\x0c')
            .enumerate()
            .map(|(i, text)| TextBlock::new(i as u32 + 1, text));
        let document = Document::from_blocks(document_id(path), blocks)
            .with_source_uri(path.display().to_string());

        debug!(path = %path.display(), pages = document.pages.len(), "loaded text document");
        Ok(document)
    }
}

/// Loads PDF files, one text block per page.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

#[cfg(feature = "pdf")]
impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let pdf = lopdf::Document::load(path)
            .map_err(|e| RagError::LoadError(format!("failed to parse {}: {e}", path.display())))?;

        let mut blocks = Vec::new();
        for page in pdf.get_pages().into_keys() {
            match pdf.extract_text(&[page]) {
                Ok(text) => blocks.push(TextBlock::new(page, text)),
                Err(e) => {
                    warn!(path = %path.display(), page, error = %e, "no text extracted from page");
                    blocks.push(TextBlock::new(page, String::new()));
                }
            }
        }

        if blocks.iter().all(|b| b.text.trim().is_empty()) {
            return Err(RagError::LoadError(format!(
                "{} contains no extractable text",
                path.display()
            )));
        }

        let document = Document::from_blocks(document_id(path), blocks)
            .with_source_uri(path.display().to_string());
        info!(path = %path.display(), pages = document.pages.len(), "loaded PDF");
        Ok(document)
    }
}

/// Pick a loader by file extension: PDFs go to [`PdfLoader`], everything
/// else to [`TextLoader`].
///
/// # Errors
///
/// Returns [`RagError::LoadError`] for a PDF when the `pdf` feature is
/// disabled, or whatever the chosen loader returns.
pub fn load_document(path: &Path) -> Result<Document> {
    let is_pdf =
        path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        #[cfg(feature = "pdf")]
        return PdfLoader.load(path);
        #[cfg(not(feature = "pdf"))]
        return Err(RagError::LoadError(format!(
            "{} is a PDF but PDF support is disabled (enable the `pdf` feature)",
            path.display()
        )));
    }
    TextLoader.load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn text_loader_splits_pages_on_form_feed() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "SEC. 1. TITLE.\x0cSEC. 2. GRANTS.").unwrap();

        let doc = TextLoader.load(file.path()).unwrap();
        assert_eq!(doc.text, "SEC. 1. TITLE.\nSEC. 2. GRANTS.");
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].page, 2);
        assert!(doc.source_uri.is_some());
    }

    #[test]
    fn missing_file_is_load_error() {
        let err = load_document(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::LoadError(_)));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn garbage_pdf_is_load_error() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"this is not a pdf").unwrap();
        let err = load_document(file.path()).unwrap_err();
        assert!(matches!(err, RagError::LoadError(_)));
    }
}
