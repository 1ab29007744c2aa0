//! RAG pipeline orchestrator and backend comparison harness.
//!
//! The [`RagPipeline`] drives the same ingest-and-answer workflow against one
//! or more [`Backend`]s: chunk → embed → upsert at ingestion time, and
//! embed → query → stuff → generate at question time. Every backend call is
//! timed so the backends can be compared by latency.
//!
//! Backends are processed one after another. A failure in one backend is
//! recorded in the report for that backend and never hides the results of the
//! others.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{Backend, BackendKind, CollectionSchema, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .synthesizer(Arc::new(llm))
//!     .backend(Backend::new("qdrant", BackendKind::ManagedCloud, qdrant, "pdfqa", CollectionSchema::cosine(384)))
//!     .backend(Backend::new("sqlite", BackendKind::LocalPersistent, sqlite, "pdfqa", CollectionSchema::cosine(384)))
//!     .build()?;
//!
//! pipeline.ingest(&documents).await?;
//! let report = pipeline.compare(&["What is the document about?"]).await?;
//! pipeline.cleanup().await;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, QueryResult, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{ErrorKind, RagError, Result};
use crate::retriever::Retriever;
use crate::synthesis::AnswerSynthesizer;
use crate::vectorstore::{CollectionSchema, VectorIndex};

/// Which family a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A hosted service reached over the network.
    ManagedCloud,
    /// A store persisted on the local filesystem.
    LocalPersistent,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ManagedCloud => f.write_str("managed-cloud"),
            BackendKind::LocalPersistent => f.write_str("local-persistent"),
        }
    }
}

/// A named vector index plus the collection the pipeline uses in it.
#[derive(Clone)]
pub struct Backend {
    /// Unique name within a pipeline, used in reports.
    pub name: String,
    /// The backend family.
    pub kind: BackendKind,
    /// The index implementation.
    pub index: Arc<dyn VectorIndex>,
    /// The collection holding this pipeline's records.
    pub collection: String,
    /// The schema the collection is created with.
    pub schema: CollectionSchema,
}

impl Backend {
    /// Describe a backend.
    pub fn new(
        name: impl Into<String>,
        kind: BackendKind,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        schema: CollectionSchema,
    ) -> Self {
        Self { name: name.into(), kind, index, collection: collection.into(), schema }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("index", &self.index.backend())
            .field("collection", &self.collection)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Lifecycle of a backend's collection as seen by the pipeline.
///
/// `Uninitialized → CollectionCreated → Populated → Deleted`. Queries are only
/// valid in `CollectionCreated` and `Populated`; `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    Uninitialized,
    CollectionCreated,
    Populated,
    Deleted,
}

impl BackendState {
    fn can_query(self) -> bool {
        matches!(self, BackendState::CollectionCreated | BackendState::Populated)
    }
}

/// A failed backend operation, captured instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFailure {
    /// The backend name.
    pub backend: String,
    /// The pipeline step that failed (`create_collection`, `upsert`, `retrieve`, ...).
    pub operation: String,
    /// The error category.
    pub kind: ErrorKind,
    /// The error message.
    pub message: String,
    /// For a failed upsert, the offset of the first record that was not
    /// written; re-upserting from here completes the ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_offset: Option<usize>,
}

impl BackendFailure {
    fn new(backend: &str, operation: &str, error: &RagError) -> Self {
        Self {
            backend: backend.to_string(),
            operation: operation.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            batch_offset: error.batch_offset(),
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed during {} ({}): {}", self.backend, self.operation, self.kind, self.message)
    }
}

/// Per-backend result of an ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// The backend name.
    pub backend: String,
    /// Number of records upserted. On a failed upsert, the records stored
    /// by the batches before the failing one.
    pub records_written: usize,
    /// Wall-clock time spent on this backend.
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    /// Set when the backend failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<BackendFailure>,
}

/// Summary of [`RagPipeline::ingest`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Number of input documents (pages).
    pub documents: usize,
    /// Number of chunks produced and embedded.
    pub chunks: usize,
    /// One entry per backend, in pipeline order.
    pub backends: Vec<IngestOutcome>,
}

impl IngestReport {
    /// Failures across all backends.
    pub fn failures(&self) -> impl Iterator<Item = &BackendFailure> {
        self.backends.iter().filter_map(|b| b.failure.as_ref())
    }
}

/// One backend's answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct BackendAnswer {
    /// The backend name.
    pub backend: String,
    /// The query text.
    pub query: String,
    /// The synthesized answer; `None` when the backend failed.
    pub answer: Option<String>,
    /// The retrieved passages, most relevant first.
    pub passages: QueryResult,
    /// Time spent embedding the query and querying the index.
    #[serde(rename = "retrieval_latency_ms", serialize_with = "serialize_millis")]
    pub retrieval_latency: Duration,
    /// Total wall-clock time for retrieval plus generation.
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    /// Set when retrieval or generation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<BackendFailure>,
}

impl BackendAnswer {
    /// Whether an answer was produced.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Latency statistics of one backend across a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    /// The backend name.
    pub backend: String,
    /// Number of queries answered successfully.
    pub succeeded: usize,
    /// Number of queries that failed.
    pub failed: usize,
    /// Mean total latency over successful queries.
    #[serde(rename = "mean_latency_ms", serialize_with = "serialize_millis")]
    pub mean_latency: Duration,
    /// Fastest successful query.
    #[serde(rename = "min_latency_ms", serialize_with = "serialize_millis")]
    pub min_latency: Duration,
    /// Slowest successful query.
    #[serde(rename = "max_latency_ms", serialize_with = "serialize_millis")]
    pub max_latency: Duration,
}

/// Result of [`RagPipeline::compare`]: one entry per query and backend.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// The queries, in the order they were run.
    pub queries: Vec<String>,
    /// Answers grouped by query, backends in pipeline order.
    pub entries: Vec<BackendAnswer>,
}

impl ComparisonReport {
    /// Latency statistics per backend, in order of first appearance.
    pub fn summary(&self) -> Vec<LatencySummary> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.backend.as_str()) {
                names.push(&entry.backend);
            }
        }

        names
            .into_iter()
            .map(|name| {
                let entries: Vec<&BackendAnswer> =
                    self.entries.iter().filter(|e| e.backend == name).collect();
                let latencies: Vec<Duration> =
                    entries.iter().filter(|e| e.is_ok()).map(|e| e.latency).collect();
                let total: Duration = latencies.iter().sum();
                LatencySummary {
                    backend: name.to_string(),
                    succeeded: latencies.len(),
                    failed: entries.len() - latencies.len(),
                    mean_latency: total
                        .checked_div(latencies.len() as u32)
                        .unwrap_or_default(),
                    min_latency: latencies.iter().min().copied().unwrap_or_default(),
                    max_latency: latencies.iter().max().copied().unwrap_or_default(),
                }
            })
            .collect()
    }
}

/// Per-backend result of [`RagPipeline::cleanup`].
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    /// The backend name.
    pub backend: String,
    /// The collection that was removed.
    pub collection: String,
    /// `false` when the collection was already absent.
    pub deleted: bool,
    /// Set when deletion failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<BackendFailure>,
}

fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
}

struct Slot {
    backend: Backend,
    retriever: Retriever,
    state: Mutex<BackendState>,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    slots: Vec<Slot>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// The configured backends, in processing order.
    pub fn backends(&self) -> impl Iterator<Item = &Backend> {
        self.slots.iter().map(|slot| &slot.backend)
    }

    /// The current lifecycle state of the named backend.
    pub async fn state(&self, backend: &str) -> Option<BackendState> {
        match self.slots.iter().find(|slot| slot.backend.name == backend) {
            Some(slot) => Some(*slot.state.lock().await),
            None => None,
        }
    }

    /// Create the collection on every backend.
    ///
    /// Existing collections with a matching schema are reused, so this is the
    /// way to attach to data ingested by an earlier run.
    pub async fn prepare(&self) -> Vec<std::result::Result<(), BackendFailure>> {
        let mut outcomes = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let mut state = slot.state.lock().await;
            outcomes.push(Self::ensure_collection(slot, &mut state).await);
        }
        outcomes
    }

    async fn ensure_collection(
        slot: &Slot,
        state: &mut BackendState,
    ) -> std::result::Result<(), BackendFailure> {
        let backend = &slot.backend;
        match *state {
            BackendState::Deleted => Err(BackendFailure::new(
                &backend.name,
                "create_collection",
                &RagError::InvalidState {
                    backend: backend.name.clone(),
                    message: "collection was deleted".into(),
                },
            )),
            BackendState::CollectionCreated | BackendState::Populated => Ok(()),
            BackendState::Uninitialized => {
                backend
                    .index
                    .create_collection(&backend.collection, backend.schema)
                    .await
                    .map_err(|e| {
                        error!(backend = %backend.name, error = %e, "create_collection failed");
                        BackendFailure::new(&backend.name, "create_collection", &e)
                    })?;
                *state = BackendState::CollectionCreated;
                Ok(())
            }
        }
    }

    /// Ingest documents into every backend: chunk → embed once → upsert.
    ///
    /// Collections are created on demand. A backend failure is recorded in
    /// the report and the remaining backends still run.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the documents cannot be embedded; in
    /// that case no backend is touched.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let chunks = self.chunker.chunk_all(documents);
        let records = self.embed_chunks(chunks).await?;

        let mut backends = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let started = Instant::now();
            let result = self.ingest_into(slot, &records).await;
            let latency = started.elapsed();
            let outcome = match result {
                Ok(written) => IngestOutcome {
                    backend: slot.backend.name.clone(),
                    records_written: written,
                    latency,
                    failure: None,
                },
                Err(failure) => IngestOutcome {
                    backend: slot.backend.name.clone(),
                    records_written: failure.batch_offset.unwrap_or(0),
                    latency,
                    failure: Some(failure),
                },
            };
            backends.push(outcome);
        }

        let report = IngestReport { documents: documents.len(), chunks: records.len(), backends };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            failed_backends = report.failures().count(),
            "ingestion completed"
        );
        Ok(report)
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<VectorRecord>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed during ingestion");
            e
        })?;
        // Dimension disagreements are left to the index, which reports them
        // as schema conflicts.
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingService {
                provider: self.embedding_provider.name().to_string(),
                message: format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            });
        }
        Ok(chunks.into_iter().zip(embeddings).map(|(chunk, e)| chunk.into_record(e)).collect())
    }

    async fn ingest_into(
        &self,
        slot: &Slot,
        records: &[VectorRecord],
    ) -> std::result::Result<usize, BackendFailure> {
        let backend = &slot.backend;
        let mut state = slot.state.lock().await;
        Self::ensure_collection(slot, &mut state).await?;
        if records.is_empty() {
            return Ok(0);
        }

        if let Err(e) = backend.index.upsert(&backend.collection, records).await {
            error!(backend = %backend.name, error = %e, "upsert failed during ingestion");
            if e.batch_offset().is_some_and(|offset| offset > 0) {
                *state = BackendState::Populated;
            }
            return Err(BackendFailure::new(&backend.name, "upsert", &e));
        }
        *state = BackendState::Populated;
        info!(backend = %backend.name, records = records.len(), "ingested records");
        Ok(records.len())
    }

    /// Answer `query` with every backend.
    ///
    /// Returns one [`BackendAnswer`] per backend, in pipeline order. Failures
    /// are captured per backend.
    pub async fn ask(&self, query: &str) -> Vec<BackendAnswer> {
        let mut answers = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            answers.push(self.ask_backend(slot, query).await);
        }
        answers
    }

    async fn ask_backend(&self, slot: &Slot, query: &str) -> BackendAnswer {
        let name = slot.backend.name.clone();
        let started = Instant::now();
        let mut answer = BackendAnswer {
            backend: name.clone(),
            query: query.to_string(),
            answer: None,
            passages: Vec::new(),
            retrieval_latency: Duration::ZERO,
            latency: Duration::ZERO,
            failure: None,
        };

        let state = *slot.state.lock().await;
        if !state.can_query() {
            let error = RagError::InvalidState {
                backend: name.clone(),
                message: format!("cannot query in state {state:?}"),
            };
            answer.failure = Some(BackendFailure::new(&name, "retrieve", &error));
            return answer;
        }

        let retrieved = slot.retriever.retrieve(query, self.config.top_k).await;
        answer.retrieval_latency = started.elapsed();
        let passages = match retrieved {
            Ok(passages) => passages,
            Err(e) => {
                warn!(backend = %name, error = %e, "retrieval failed");
                answer.latency = started.elapsed();
                answer.failure = Some(BackendFailure::new(&name, "retrieve", &e));
                return answer;
            }
        };

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let generated = self.synthesizer.answer(query, &texts).await;
        answer.latency = started.elapsed();
        answer.passages = passages;
        match generated {
            Ok(text) => {
                info!(
                    backend = %name,
                    passages = answer.passages.len(),
                    retrieval_ms = answer.retrieval_latency.as_millis() as u64,
                    latency_ms = answer.latency.as_millis() as u64,
                    "query answered"
                );
                answer.answer = Some(text);
            }
            Err(e) => {
                warn!(backend = %name, synthesizer = self.synthesizer.name(), error = %e, "generation failed");
                answer.failure = Some(BackendFailure::new(&name, "generate", &e));
            }
        }
        answer
    }

    /// Run every query against every backend and collect the timings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `queries` is empty.
    pub async fn compare<Q: AsRef<str>>(&self, queries: &[Q]) -> Result<ComparisonReport> {
        if queries.is_empty() {
            return Err(RagError::Configuration("at least one query is required".into()));
        }

        let mut entries = Vec::with_capacity(queries.len() * self.slots.len());
        for query in queries {
            entries.extend(self.ask(query.as_ref()).await);
        }
        Ok(ComparisonReport {
            queries: queries.iter().map(|q| q.as_ref().to_string()).collect(),
            entries,
        })
    }

    /// Delete the collection on every backend.
    ///
    /// A collection that is already gone counts as success, so cleanup can be
    /// repeated. Afterwards every backend is in [`BackendState::Deleted`].
    pub async fn cleanup(&self) -> Vec<CleanupOutcome> {
        let mut outcomes = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let backend = &slot.backend;
            let mut state = slot.state.lock().await;
            let mut outcome = CleanupOutcome {
                backend: backend.name.clone(),
                collection: backend.collection.clone(),
                deleted: false,
                failure: None,
            };
            match backend.index.delete_collection(&backend.collection).await {
                Ok(()) => {
                    outcome.deleted = true;
                    *state = BackendState::Deleted;
                }
                Err(RagError::NotFound { .. }) => {
                    *state = BackendState::Deleted;
                }
                Err(e) => {
                    error!(backend = %backend.name, error = %e, "delete_collection failed");
                    outcome.failure = Some(BackendFailure::new(&backend.name, "delete_collection", &e));
                }
            }
            info!(backend = %backend.name, collection = %backend.collection, deleted = outcome.deleted, "cleanup");
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, the synthesizer and at least one backend are
/// required. The config defaults to [`RagConfig::default()`] and the chunker
/// is derived from the config unless set.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Chunker>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    backends: Vec<Backend>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the answer synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Add a backend. Backends are processed in the order they are added.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backends.push(backend);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a required part is missing, the
    /// config is invalid, two backends share a name, or a backend's schema
    /// dimension differs from the embedding provider's.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".to_string()))?;
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| RagError::Configuration("synthesizer is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Chunker::from_config(&config)?,
        };
        if self.backends.is_empty() {
            return Err(RagError::Configuration("at least one backend is required".to_string()));
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                return Err(RagError::Configuration(format!(
                    "duplicate backend name '{}'",
                    backend.name
                )));
            }
            if backend.schema.dimension != embedding_provider.dimensions() {
                return Err(RagError::Configuration(format!(
                    "backend '{}' expects dimension {} but embedding provider '{}' produces {}",
                    backend.name,
                    backend.schema.dimension,
                    embedding_provider.name(),
                    embedding_provider.dimensions()
                )));
            }
        }

        let slots = self
            .backends
            .into_iter()
            .map(|backend| Slot {
                retriever: Retriever::new(
                    embedding_provider.clone(),
                    backend.index.clone(),
                    backend.collection.clone(),
                ),
                backend,
                state: Mutex::new(BackendState::Uninitialized),
            })
            .collect();

        Ok(RagPipeline { config, embedding_provider, chunker, synthesizer, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(backend: &str, millis: u64, ok: bool) -> BackendAnswer {
        BackendAnswer {
            backend: backend.into(),
            query: "q".into(),
            answer: ok.then(|| "a".to_string()),
            passages: Vec::new(),
            retrieval_latency: Duration::from_millis(millis / 2),
            latency: Duration::from_millis(millis),
            failure: (!ok).then(|| BackendFailure {
                backend: backend.into(),
                operation: "retrieve".into(),
                kind: ErrorKind::TransientNetwork,
                message: "timeout".into(),
                batch_offset: None,
            }),
        }
    }

    #[test]
    fn summary_averages_successful_queries_per_backend() {
        let report = ComparisonReport {
            queries: vec!["q".into(); 3],
            entries: vec![
                answer("qdrant", 30, true),
                answer("sqlite", 2, true),
                answer("qdrant", 50, true),
                answer("sqlite", 4, true),
                answer("qdrant", 999, false),
                answer("sqlite", 6, true),
            ],
        };
        let summary = report.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].backend, "qdrant");
        assert_eq!((summary[0].succeeded, summary[0].failed), (2, 1));
        assert_eq!(summary[0].mean_latency, Duration::from_millis(40));
        assert_eq!(summary[0].max_latency, Duration::from_millis(50));
        assert_eq!(summary[1].min_latency, Duration::from_millis(2));
        assert_eq!(summary[1].mean_latency, Duration::from_millis(4));
    }

    #[test]
    fn answers_serialize_latency_in_milliseconds() {
        let json = serde_json::to_value(answer("sqlite", 12, true)).unwrap();
        assert_eq!(json["latency_ms"], 12.0);
        assert_eq!(json["retrieval_latency_ms"], 6.0);
        assert!(json.get("failure").is_none());

        let json = serde_json::to_value(answer("qdrant", 1, false)).unwrap();
        assert_eq!(json["failure"]["kind"], "transient_network");
    }

    #[test]
    fn only_created_or_populated_backends_accept_queries() {
        assert!(!BackendState::Uninitialized.can_query());
        assert!(BackendState::CollectionCreated.can_query());
        assert!(BackendState::Populated.can_query());
        assert!(!BackendState::Deleted.can_query());
    }
}
