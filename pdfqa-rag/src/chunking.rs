//! Document chunking.
//!
//! A [`Chunker`] validates the chunk parameters and turns documents into
//! [`Chunk`]s. Where a chunk ends is decided by a pluggable [`Splitter`]:
//!
//! - [`RecursiveSplitter`] - prefers paragraph, line, sentence, then word boundaries
//! - [`CharacterSplitter`] - hard cut by character count
//!
//! Both splitters produce sliding windows in which every window starts exactly
//! `chunk_overlap` characters before the previous one ended, so removing the
//! overlap from consecutive chunks restores the original text (see [`reassemble`]).
//! Sizes are counted in characters, not bytes.

use std::fmt;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Default separators for [`RecursiveSplitter`], highest priority first.
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A character range `[start, end)` within a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of the first character.
    pub start: usize,
    /// Offset one past the last character.
    pub end: usize,
}

/// A strategy for deciding chunk boundaries.
///
/// Implementations receive parameters already validated by [`Chunker`]
/// (`chunk_size > 0`, `chunk_overlap < chunk_size`) and must return spans in
/// document order, each at most `chunk_size` characters long, each starting
/// `chunk_overlap` characters before the previous span's end.
pub trait Splitter: Send + Sync + fmt::Debug {
    /// Split `text` into character spans.
    fn split(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Span>;
}

/// Walk `len` characters in windows, letting `choose_end` pick each cut
/// inside `[min_end, max_end]`. The last window always runs to the end.
fn sliding_windows(
    len: usize,
    chunk_size: usize,
    chunk_overlap: usize,
    choose_end: impl Fn(usize, usize, usize) -> usize,
) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;

    while len > 0 {
        let max_end = (start + chunk_size).min(len);
        if max_end == len {
            spans.push(Span { start, end: len });
            break;
        }

        // Ending at or before start + overlap would not advance the window.
        let min_end = start + chunk_overlap + 1;
        let end = choose_end(start, min_end, max_end).clamp(min_end, max_end);
        spans.push(Span { start, end });
        start = end - chunk_overlap;
    }

    spans
}

/// Splits by a fixed number of characters.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{CharacterSplitter, Chunker};
///
/// let chunker = Chunker::new(256, 32)?.with_splitter(Arc::new(CharacterSplitter));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterSplitter;

impl Splitter for CharacterSplitter {
    fn split(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
        let len = text.chars().count();
        sliding_windows(len, chunk_size, chunk_overlap, |_, _, max_end| max_end)
    }
}

/// Splits at the most natural boundary that fits the window.
///
/// Separators are tried in priority order; for the first separator that
/// occurs inside the window the latest occurrence wins. A cut may fall right
/// after any separator, or right before a whitespace-only separator. When no
/// separator fits, the window is cut at `chunk_size` characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    separators: Vec<Vec<char>>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::with_separators(&DEFAULT_SEPARATORS)
    }
}

impl RecursiveSplitter {
    /// Create a splitter with the default separator chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a splitter with a custom separator chain, highest priority first.
    /// Empty separators are ignored.
    pub fn with_separators(separators: &[&str]) -> Self {
        let separators = separators
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().collect())
            .collect();
        Self { separators }
    }

    fn is_boundary(chars: &[char], pos: usize, separator: &[char]) -> bool {
        let n = separator.len();
        let ends_with = pos >= n && &chars[pos - n..pos] == separator;
        let starts_with = separator.iter().all(|c| c.is_whitespace())
            && pos + n <= chars.len()
            && &chars[pos..pos + n] == separator;
        ends_with || starts_with
    }

    fn best_end(&self, chars: &[char], min_end: usize, max_end: usize) -> usize {
        for separator in &self.separators {
            if let Some(pos) =
                (min_end..=max_end).rev().find(|&pos| Self::is_boundary(chars, pos, separator))
            {
                return pos;
            }
        }
        max_end
    }
}

impl Splitter for RecursiveSplitter {
    fn split(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        sliding_windows(chars.len(), chunk_size, chunk_overlap, |_, min_end, max_end| {
            self.best_end(&chars, min_end, max_end)
        })
    }
}

/// Splits documents into overlapping chunks.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{Chunker, Document};
///
/// let chunker = Chunker::new(1000, 100)?;
/// let chunks = chunker.chunk(&Document::new("notes.txt", text));
/// ```
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: Arc<dyn Splitter>,
}

impl Chunker {
    /// Create a chunker using [`RecursiveSplitter`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, splitter: Arc::new(RecursiveSplitter::default()) })
    }

    /// Create a chunker from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the boundary strategy.
    pub fn with_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.splitter = splitter;
        self
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` for an empty document. Each chunk inherits the
    /// document's metadata.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.text.chars().collect();
        self.splitter
            .split(&document.text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                document_source: document.source.clone(),
                page: document.page,
                index,
                text: chars[span.start..span.end].iter().collect(),
                start: span.start,
                end: span.end,
                metadata: document.metadata.clone(),
            })
            .collect()
    }

    /// Split several documents, preserving document order.
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

/// Split a document with the default strategy.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] for invalid parameters.
pub fn chunk(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Rebuild the text of one document from its consecutive chunks by dropping
/// the first `chunk_overlap` characters of every chunk after the first.
pub fn reassemble(chunks: &[Chunk], chunk_overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(&chunk.text);
        } else {
            text.extend(chunk.text.chars().skip(chunk_overlap));
        }
    }
    text
}
