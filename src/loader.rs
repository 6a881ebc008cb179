//! # Document loading
//!
//! The ingestion pipeline consumes documents through the [`DocumentLoader`]
//! trait: a path in, an ordered sequence of per-page plain text out. The
//! engine itself never parses file formats; [`PdfLoader`] is the bundled
//! implementation for PDF files, built on `lopdf`.
//!
//! Extracted page text is cleaned up before it reaches the chunker: null
//! characters are removed and blank lines collapsed, since PDF content
//! streams tend to be littered with both.

use std::path::Path;

use tracing::debug;

use crate::error::LoadError;

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Cleaned plain text of the page.
    pub text: String,
    /// 1-indexed page number.
    pub number: u32,
}

/// Source of per-page document text.
///
/// Implementations validate the path and produce pages in document order.
/// A document with no extractable text is a [`LoadError::Empty`], not an
/// empty page list, so batch ingestion can record why it was skipped.
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Vec<Page>, LoadError>;
}

/// PDF text extraction via `lopdf`, one [`Page`] per PDF page.
#[derive(Debug, Default)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<Page>, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(LoadError::NotPdf(path.to_path_buf()));
        }

        let document = lopdf::Document::load(path).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut pages = Vec::new();
        for (number, _object_id) in document.get_pages() {
            match document.extract_text(&[number]) {
                Ok(raw) => {
                    let text = cleanup_page_text(&raw);
                    if !text.is_empty() {
                        pages.push(Page { text, number });
                    }
                }
                Err(err) => {
                    debug!("no text extracted from page {number} of {}: {err}", path.display());
                }
            }
        }

        if pages.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }
        Ok(pages)
    }
}

/// Strip null characters, trim each line, and drop blank lines.
fn cleanup_page_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
