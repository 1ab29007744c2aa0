//! Vector index trait and helpers shared by the backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{QueryResult, ScoredPassage, VectorRecord};
use crate::error::{RagError, Result};

/// Default number of records per upsert call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// The similarity measure of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity; scores lie in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw dot product.
    DotProduct,
    /// Euclidean distance; the score is the negated distance.
    Euclidean,
}

impl DistanceMetric {
    /// Stable lowercase name, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Relevance of `b` to `a` under this metric; higher is more relevant.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" | "dot_product" | "dotproduct" => Ok(DistanceMetric::DotProduct),
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclidean),
            other => Err(RagError::Configuration(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// The fixed shape of a collection: vector dimension and metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Length of every vector in the collection.
    pub dimension: usize,
    /// The similarity measure used by queries.
    pub metric: DistanceMetric,
}

impl CollectionSchema {
    /// A cosine collection of the given dimension.
    pub fn cosine(dimension: usize) -> Self {
        Self { dimension, metric: DistanceMetric::Cosine }
    }

    /// Fail with [`RagError::SchemaConflict`] unless `other` is identical.
    pub fn ensure_matches(&self, collection: &str, other: &CollectionSchema) -> Result<()> {
        if self == other {
            return Ok(());
        }
        Err(RagError::SchemaConflict {
            collection: collection.to_string(),
            message: format!(
                "existing schema is {} dims/{}, requested {} dims/{}",
                self.dimension, self.metric, other.dimension, other.metric
            ),
        })
    }

    /// Fail with [`RagError::SchemaConflict`] if `vector` has the wrong length.
    pub fn ensure_dimension(&self, collection: &str, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            return Ok(());
        }
        Err(RagError::SchemaConflict {
            collection: collection.to_string(),
            message: format!(
                "vector has dimension {}, collection expects {}",
                vector.len(),
                self.dimension
            ),
        })
    }
}

/// A storage backend for vector records with nearest-neighbour search.
///
/// Implementations manage named collections whose [`CollectionSchema`] is
/// fixed at creation.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{CollectionSchema, SqliteVectorIndex, VectorIndex};
///
/// let index = SqliteVectorIndex::open("./pdfqa-data").await?;
/// index.create_collection("docs", CollectionSchema::cosine(384)).await?;
/// index.upsert("docs", &records).await?;
/// let results = index.query("docs", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// A short backend identifier used in logs and errors.
    fn backend(&self) -> &str;

    /// Create a named collection.
    ///
    /// No-op if it already exists with the same schema; fails with
    /// [`RagError::SchemaConflict`] if it exists with a different one.
    async fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()>;

    /// Delete a named collection and all its records.
    ///
    /// Fails with [`RagError::NotFound`] if the collection does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Add or replace records by id.
    ///
    /// Records are written in batches; a failing batch stops the upsert with
    /// [`RagError::Storage`] carrying the batch offset, leaving earlier
    /// batches written.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `k` records nearest to `embedding`, most relevant first.
    ///
    /// Fails with [`RagError::Configuration`] when `k == 0`. An empty
    /// collection yields an empty result.
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<QueryResult>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

pub(crate) fn ensure_top_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Configuration("k must be greater than zero".into()));
    }
    Ok(())
}

/// Split records into `(offset, batch)` pairs of at most `batch_size` records.
pub(crate) fn batches(
    records: &[VectorRecord],
    batch_size: usize,
) -> impl Iterator<Item = (usize, &[VectorRecord])> {
    let size = batch_size.max(1);
    records.chunks(size).enumerate().map(move |(i, batch)| (i * size, batch))
}

/// Attach the batch offset to a failed upsert batch.
///
/// Failures that say nothing about storage (credentials, parameters, schema,
/// missing collection) keep their own kind.
pub(crate) fn batch_failure(backend: &str, offset: usize, error: RagError) -> RagError {
    match error {
        RagError::Authentication { .. }
        | RagError::Configuration(_)
        | RagError::SchemaConflict { .. }
        | RagError::NotFound { .. } => error,
        RagError::Storage { message, .. } => RagError::Storage {
            backend: backend.to_string(),
            batch_offset: Some(offset),
            message,
        },
        other => RagError::Storage {
            backend: backend.to_string(),
            batch_offset: Some(offset),
            message: format!("{}: {other}", other.kind()),
        },
    }
}

/// Keep the `k` most relevant passages, dropping duplicate ids.
pub(crate) fn rank(mut passages: Vec<ScoredPassage>, k: usize) -> QueryResult {
    passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen = std::collections::HashSet::new();
    passages.retain(|p| seen.insert(p.id.clone()));
    passages.truncate(k);
    passages
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn passage(id: &str, score: f32) -> ScoredPassage {
        ScoredPassage { id: id.into(), text: id.into(), score, metadata: HashMap::new() }
    }

    fn record(id: &str) -> VectorRecord {
        VectorRecord { id: id.into(), embedding: vec![1.0], text: id.into(), metadata: HashMap::new() }
    }

    #[test]
    fn metric_scores_order_by_relevance() {
        let q = [1.0, 0.0];
        let near = [0.9, 0.1];
        let far = [-1.0, 0.0];
        for metric in [DistanceMetric::Cosine, DistanceMetric::DotProduct, DistanceMetric::Euclidean] {
            assert!(metric.score(&q, &near) > metric.score(&q, &far), "{metric}");
        }
        assert_eq!(DistanceMetric::Cosine.score(&q, &far), -1.0);
    }

    #[test]
    fn metric_round_trips_through_its_name() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::DotProduct, DistanceMetric::Euclidean] {
            assert_eq!(metric.as_str().parse::<DistanceMetric>().unwrap(), metric);
        }
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn schema_mismatch_is_a_conflict() {
        let schema = CollectionSchema::cosine(384);
        assert!(schema.ensure_matches("c", &CollectionSchema::cosine(384)).is_ok());
        let err = schema.ensure_matches("c", &CollectionSchema::cosine(768)).unwrap_err();
        assert!(matches!(err, RagError::SchemaConflict { .. }));
        let other_metric = CollectionSchema { dimension: 384, metric: DistanceMetric::Euclidean };
        assert!(schema.ensure_matches("c", &other_metric).is_err());
        assert!(schema.ensure_dimension("c", &[0.0; 3]).is_err());
    }

    #[test]
    fn batches_report_offsets() {
        let records: Vec<_> = (0..250).map(|i| record(&i.to_string())).collect();
        let offsets: Vec<_> = batches(&records, 100).map(|(o, b)| (o, b.len())).collect();
        assert_eq!(offsets, [(0, 100), (100, 100), (200, 50)]);
    }

    #[test]
    fn batch_failure_keeps_auth_errors() {
        let auth = RagError::Authentication { backend: "q".into(), message: "denied".into() };
        assert!(matches!(batch_failure("q", 100, auth), RagError::Authentication { .. }));
        let transient = RagError::TransientNetwork { backend: "q".into(), message: "reset".into() };
        match batch_failure("q", 100, transient) {
            RagError::Storage { batch_offset, .. } => assert_eq!(batch_offset, Some(100)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rank_sorts_dedupes_and_truncates() {
        let ranked = rank(
            vec![passage("a", 0.1), passage("b", 0.9), passage("b", 0.9), passage("c", 0.5)],
            2,
        );
        let ids: Vec<_> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn zero_k_is_rejected() {
        assert!(matches!(ensure_top_k(0), Err(RagError::Configuration(_))));
        assert!(ensure_top_k(1).is_ok());
    }
}
