//! Data types for documents, chunks, vector records and query results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document: the text of one PDF page (or a whole text file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Where the text came from, usually a file path.
    pub source: String,
    /// 1-based page number for paged sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document without page information.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), page: None, text: text.into(), metadata: HashMap::new() }
    }

    /// Set the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous passage of a [`Document`].
///
/// `start` and `end` are character offsets (not bytes) into the parent text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The parent document's source.
    pub document_source: String,
    /// The parent document's page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Position of this chunk within its document, starting at 0.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// The stable record id of this chunk.
    pub fn record_id(&self) -> String {
        record_id(&self.document_source, self.page, self.index)
    }

    /// Pair this chunk with its embedding to form a [`VectorRecord`].
    pub fn into_record(self, embedding: Vec<f32>) -> VectorRecord {
        let id = self.record_id();
        let mut metadata = self.metadata;
        metadata.insert("source".to_string(), self.document_source);
        if let Some(page) = self.page {
            metadata.insert("page".to_string(), page.to_string());
        }
        metadata.insert("chunk_index".to_string(), self.index.to_string());
        VectorRecord { id, embedding, text: self.text, metadata }
    }
}

/// Derive the record id for a chunk.
///
/// The id is a UUIDv5 over the source, page and chunk index, so re-ingesting
/// the same document replaces records instead of duplicating them. UUIDs are
/// accepted as point ids by every backend.
pub fn record_id(source: &str, page: Option<u32>, index: usize) -> String {
    let name = match page {
        Some(page) => format!("{source}#page={page}#chunk={index}"),
        None => format!("{source}#chunk={index}"),
    };
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// The persisted unit of a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Unique identifier within a collection.
    pub id: String,
    /// The vector embedding of `text`.
    pub embedding: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// Key-value metadata.
    pub metadata: HashMap<String, String>,
}

/// A retrieved passage paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPassage {
    /// The id of the matching record.
    pub id: String,
    /// The passage text.
    pub text: String,
    /// The relevance score (higher is more relevant).
    pub score: f32,
    /// The record's metadata.
    pub metadata: HashMap<String, String>,
}

/// Passages ordered by descending relevance.
pub type QueryResult = Vec<ScoredPassage>;
