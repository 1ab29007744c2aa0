//! # pdfqa-rag
//!
//! Retrieval-augmented question answering over PDF documents, with a latency
//! comparison between vector index backends.
//!
//! ## Overview
//!
//! A PDF is split into per-page [`Document`]s, cut into overlapping
//! [`Chunk`]s, embedded once and upserted into every configured
//! [`VectorIndex`]. Questions are answered per backend by retrieving the top
//! passages and "stuffing" them into a single prompt for a language model.
//!
//! - [`QdrantVectorIndex`] - managed Qdrant (cloud or self-hosted) over gRPC
//! - [`SqliteVectorIndex`] - local persistent index in a SQLite file
//! - [`OpenAIEmbeddingProvider`] / [`OpenAIChatSynthesizer`] - OpenAI-compatible HTTP APIs
//! - [`HashEmbeddingProvider`] / [`PassthroughSynthesizer`] - offline stand-ins
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfqa_rag::*;
//!
//! let embedder = Arc::new(HashEmbeddingProvider::new(384));
//! let sqlite = Arc::new(SqliteVectorIndex::open("./pdfqa-data").await?);
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(embedder)
//!     .synthesizer(Arc::new(PassthroughSynthesizer))
//!     .backend(Backend::new("sqlite", BackendKind::LocalPersistent, sqlite, "pdfqa", CollectionSchema::cosine(384)))
//!     .build()?;
//!
//! pipeline.ingest(&load_pdf("paper.pdf").await?).await?;
//! for answer in pipeline.ask("What is the paper about?").await {
//!     println!("{}: {:?} in {:?}", answer.backend, answer.answer, answer.latency);
//! }
//! ```
//!
//! ## Features
//!
//! - `openai` - OpenAI-compatible embeddings and chat (default)
//! - `qdrant` - Qdrant backend (default)
//! - `sqlite` - SQLite backend (default)
//! - `pdf` - PDF text extraction (default)

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod retriever;
pub mod retry;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod synthesis;
pub mod vectorstore;

pub use chunking::{CharacterSplitter, Chunker, RecursiveSplitter, Span, Splitter, reassemble};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, QueryResult, ScoredPassage, VectorRecord, record_id};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{ErrorKind, RagError, Result};
#[cfg(feature = "pdf")]
pub use loader::load_pdf;
pub use loader::{documents_from_text, load_text};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{
    Backend, BackendAnswer, BackendFailure, BackendKind, BackendState, CleanupOutcome,
    ComparisonReport, IngestOutcome, IngestReport, LatencySummary, RagPipeline,
    RagPipelineBuilder,
};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorIndex;
pub use retriever::Retriever;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorIndex;
#[cfg(feature = "openai")]
pub use synthesis::OpenAIChatSynthesizer;
pub use synthesis::{AnswerSynthesizer, PassthroughSynthesizer, StuffPrompt};
pub use vectorstore::{CollectionSchema, DistanceMetric, VectorIndex, cosine_similarity};
