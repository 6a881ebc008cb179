//! # Chunker
//!
//! Splits raw document text into overlapping, bounded segments that become
//! the unit of retrieval.
//!
//! The splitter works through a priority list of separators — paragraph
//! break, line break, space, and finally individual characters — trying the
//! coarsest separator first and recursing into finer ones only for segments
//! that still exceed the size limit. Adjacent chunks share a trailing/leading
//! window of up to [`CHUNK_OVERLAP`] characters so that sentences straddling
//! a boundary stay retrievable.
//!
//! All lengths are measured in Unicode scalar values, not bytes, so
//! multi-byte text never gets sliced mid-character.
//!
//! ## Quick example
//! ```rust
//! use tome::chunker::Chunker;
//!
//! let chunker = Chunker::default();
//! let chunks = chunker.split_text("First paragraph.\n\nSecond paragraph.");
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

use crate::loader::Page;

/// Maximum chunk length, in characters.
pub const CHUNK_SIZE: usize = 1000;

/// Maximum overlap carried between consecutive chunks, in characters.
pub const CHUNK_OVERLAP: usize = 200;

/// Separator priority: paragraph break, line break, space, character.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A bounded text segment of a document, with enough metadata to cite its
/// origin when it is retrieved later.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The segment text. Never longer than the configured chunk size.
    pub text: String,
    /// Name of the source document (file name, not full path).
    pub document: String,
    /// 1-indexed page number the segment was extracted from.
    pub page: u32,
    /// Position of this chunk within its document's chunk sequence.
    pub index: usize,
}

/// Recursive character splitter with a fixed size limit and overlap.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Create a chunker with explicit bounds. `chunk_overlap` must be smaller
    /// than `chunk_size`, otherwise the merge loop could never make progress.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk overlap must be smaller than chunk size"
        );
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split a document's pages into an ordered chunk sequence.
    ///
    /// Each page is split independently, so a chunk never spans a page
    /// boundary and every chunk carries the page number it came from.
    /// Identical input always yields an identical chunk sequence.
    pub fn split_document(&self, document: &str, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                let index = chunks.len();
                chunks.push(Chunk {
                    text,
                    document: document.to_string(),
                    page: page.number,
                    index,
                });
            }
        }
        chunks
    }

    /// Split raw text into bounded segments. Empty input yields an empty
    /// sequence, not an error.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut segments = self.split_with(text, &SEPARATORS);
        segments.retain(|s| !s.trim().is_empty());
        for segment in &mut segments {
            *segment = segment.trim().to_string();
        }
        segments
    }

    /// Recursive splitting step: pick the coarsest separator present in the
    /// text, split on it, and recurse with the finer separators into any
    /// piece that is still too long.
    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut chosen = *separators.last().unwrap_or(&"");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                chosen = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut output = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, chosen) {
            if char_len(&piece) <= self.chunk_size {
                good.push(piece);
            } else {
                // Flush what fits so ordering is preserved, then recurse into
                // the oversized piece with the finer separators.
                if !good.is_empty() {
                    output.extend(self.merge_pieces(&good));
                    good.clear();
                }
                output.extend(self.split_with(&piece, remaining));
            }
        }
        if !good.is_empty() {
            output.extend(self.merge_pieces(&good));
        }
        output
    }

    /// Greedily pack size-bounded pieces into chunks, retaining a tail of up
    /// to `chunk_overlap` characters as the head of the next chunk.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().copied().collect::<String>());
                // Shrink the retained tail until it fits the overlap bound
                // and leaves room for the incoming piece.
                while window_len > self.chunk_overlap
                    || (window_len + piece_len > self.chunk_size && window_len > 0)
                {
                    if let Some(front) = window.pop_front() {
                        window_len -= char_len(front);
                    } else {
                        break;
                    }
                }
            }
            window.push_back(piece);
            window_len += piece_len;
        }

        if !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
        }
        chunks
    }
}

/// Split `text` on `sep`, keeping the separator attached to the end of the
/// preceding piece so that concatenating all pieces reproduces the text.
/// The empty separator splits into individual characters.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
