//! Managed vector index backed by Qdrant.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndex`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. Works
//! against Qdrant Cloud (URL + API key) or a self-hosted instance.
//!
//! Every client call goes through the configured [`RetryPolicy`]; gRPC status
//! codes are classified into the crate's error taxonomy so only transient
//! failures are retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::connect("https://xyz.cloud.qdrant.io:6334", Some(api_key), timeout)?;
//! index.create_collection("docs", CollectionSchema::cosine(384)).await?;
//! index.upsert("docs", &records).await?;
//! let results = index.query("docs", &query_embedding, 3).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use tokio::sync::RwLock;
use tonic::{Code, Status};
use tracing::debug;

use crate::document::{QueryResult, ScoredPassage, VectorRecord};
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;
use crate::vectorstore::{
    CollectionSchema, DEFAULT_BATCH_SIZE, DistanceMetric, VectorIndex, batch_failure, batches,
    ensure_top_k, rank,
};

const BACKEND: &str = "qdrant";

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// Record text and metadata are stored as point payload; record ids must be
/// UUIDs or unsigned integers, which [`record_id`](crate::document::record_id)
/// guarantees. Collection schemas are cached after the first lookup so
/// queries cost a single round trip.
pub struct QdrantVectorIndex {
    client: Qdrant,
    retry: RetryPolicy,
    batch_size: usize,
    schemas: RwLock<HashMap<String, CollectionSchema>>,
}

impl QdrantVectorIndex {
    /// Connect to the given URL, optionally authenticating with an API key.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the client cannot be built
    /// (e.g. an invalid URL). No network call is made here.
    pub fn connect(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("invalid qdrant client setup: {e}")))?;
        Ok(Self::from_client(client))
    }

    /// Create an index from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the number of points sent per upsert request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn map_err(e: QdrantError) -> RagError {
        match e {
            QdrantError::ResponseError { status } => Self::map_status(&status),
            // Rate limiting with a retry-after hint arrives as its own variant.
            QdrantError::ResourceExhaustedError { status, retry_after_seconds } => {
                RagError::TransientNetwork {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "{} (retry after {retry_after_seconds}s)",
                        status.message()
                    ),
                }
            }
            other => RagError::storage(BACKEND, other.to_string()),
        }
    }

    fn map_status(status: &Status) -> RagError {
        let message = status.message().to_string();
        match status.code() {
            Code::Unauthenticated | Code::PermissionDenied => {
                RagError::Authentication { backend: BACKEND.to_string(), message }
            }
            Code::Unavailable
            | Code::DeadlineExceeded
            | Code::ResourceExhausted
            | Code::Aborted
            | Code::Cancelled => RagError::TransientNetwork { backend: BACKEND.to_string(), message },
            code => RagError::storage(BACKEND, format!("{code:?}: {message}")),
        }
    }

    fn to_distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::DotProduct => Distance::Dot,
            DistanceMetric::Euclidean => Distance::Euclid,
        }
    }

    fn from_distance(distance: i32) -> Option<DistanceMetric> {
        match Distance::try_from(distance).ok()? {
            Distance::Cosine => Some(DistanceMetric::Cosine),
            Distance::Dot => Some(DistanceMetric::DotProduct),
            Distance::Euclid => Some(DistanceMetric::Euclidean),
            _ => None,
        }
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let client = &self.client;
        self.retry
            .run("collection_exists", || async move {
                client.collection_exists(name).await.map_err(Self::map_err)
            })
            .await
    }

    /// Read the schema of an existing collection, `None` if it does not exist.
    async fn schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        if !self.exists(name).await? {
            return Ok(None);
        }

        let client = &self.client;
        let info = self
            .retry
            .run("collection_info", || async move {
                client.collection_info(name).await.map_err(Self::map_err)
            })
            .await?;

        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        match params {
            Some(VectorsConfigKind::Params(params)) => {
                let metric = Self::from_distance(params.distance).ok_or_else(|| {
                    RagError::SchemaConflict {
                        collection: name.to_string(),
                        message: format!("unsupported distance {}", params.distance),
                    }
                })?;
                Ok(Some(CollectionSchema { dimension: params.size as usize, metric }))
            }
            _ => Err(RagError::SchemaConflict {
                collection: name.to_string(),
                message: "collection does not use a single unnamed vector".to_string(),
            }),
        }
    }

    async fn require_schema(&self, name: &str) -> Result<CollectionSchema> {
        if let Some(schema) = self.schemas.read().await.get(name) {
            return Ok(*schema);
        }
        let schema =
            self.schema(name).await?.ok_or_else(|| RagError::not_found(BACKEND, name))?;
        self.schemas.write().await.insert(name.to_string(), schema);
        Ok(schema)
    }

    fn to_point(record: &VectorRecord) -> Result<PointStruct> {
        let mut payload_map = serde_json::Map::new();
        payload_map.insert("text".to_string(), serde_json::Value::String(record.text.clone()));
        let metadata_obj: serde_json::Map<String, serde_json::Value> = record
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        payload_map.insert("metadata".to_string(), serde_json::Value::Object(metadata_obj));

        let payload =
            Payload::try_from(serde_json::Value::Object(payload_map)).map_err(Self::map_err)?;
        Ok(PointStruct::new(record.id.clone(), record.embedding.clone(), payload))
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        schema: &CollectionSchema,
        batch: &[VectorRecord],
    ) -> Result<()> {
        for record in batch {
            schema.ensure_dimension(collection, &record.embedding)?;
        }
        let points = batch.iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;

        let client = &self.client;
        self.retry
            .run("upsert_points", || {
                let request = UpsertPointsBuilder::new(collection, points.clone()).wait(true);
                async move { client.upsert_points(request).await.map_err(Self::map_err) }
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        if schema.dimension == 0 {
            return Err(RagError::Configuration("collection dimension must be positive".into()));
        }
        if let Some(existing) = self.schema(name).await? {
            existing.ensure_matches(name, &schema)?;
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        let client = &self.client;
        self.retry
            .run("create_collection", || {
                let request = CreateCollectionBuilder::new(name).vectors_config(
                    VectorParamsBuilder::new(
                        schema.dimension as u64,
                        Self::to_distance(schema.metric),
                    ),
                );
                async move { client.create_collection(request).await.map_err(Self::map_err) }
            })
            .await?;
        self.schemas.write().await.insert(name.to_string(), schema);

        debug!(collection = name, dimension = schema.dimension, metric = %schema.metric, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.schemas.write().await.remove(name);
        if !self.exists(name).await? {
            return Err(RagError::not_found(BACKEND, name));
        }

        let client = &self.client;
        self.retry
            .run("delete_collection", || async move {
                client.delete_collection(name).await.map_err(Self::map_err)
            })
            .await?;

        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let schema = self.require_schema(collection).await?;
        if records.is_empty() {
            return Ok(());
        }

        for (offset, batch) in batches(records, self.batch_size) {
            self.upsert_batch(collection, &schema, batch)
                .await
                .map_err(|e| batch_failure(BACKEND, offset, e))?;
            debug!(collection, offset, count = batch.len(), "upserted batch to qdrant");
        }
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<QueryResult> {
        ensure_top_k(k)?;
        let schema = self.require_schema(collection).await?;
        schema.ensure_dimension(collection, embedding)?;

        let client = &self.client;
        let response = self
            .retry
            .run("search_points", || {
                let request = SearchPointsBuilder::new(collection, embedding.to_vec(), k as u64)
                    .with_payload(true);
                async move { client.search_points(request).await.map_err(Self::map_err) }
            })
            .await?;

        let passages = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .as_ref()
                    .and_then(|pid| match &pid.point_id_options {
                        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    })
                    .unwrap_or_default();

                let text =
                    scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();

                let metadata: HashMap<String, String> = scored
                    .payload
                    .get("metadata")
                    .and_then(|v| match &v.kind {
                        Some(Kind::StructValue(s)) => Some(
                            s.fields
                                .iter()
                                .filter_map(|(k, v)| {
                                    Self::extract_string(v).map(|s| (k.clone(), s))
                                })
                                .collect(),
                        ),
                        _ => None,
                    })
                    .unwrap_or_default();

                // Qdrant reports euclidean results as distances.
                let score = match schema.metric {
                    DistanceMetric::Euclidean => -scored.score,
                    _ => scored.score,
                };

                ScoredPassage { id, text, score, metadata }
            })
            .collect();

        Ok(rank(passages, k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.require_schema(collection).await?;
        let client = &self.client;
        let response = self
            .retry
            .run("count", || async move {
                client
                    .count(CountPointsBuilder::new(collection).exact(true))
                    .await
                    .map_err(Self::map_err)
            })
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: Code) -> QdrantError {
        QdrantError::ResponseError { status: Status::new(code, "boom") }
    }

    #[test]
    fn grpc_status_codes_map_to_error_kinds() {
        assert!(matches!(
            QdrantVectorIndex::map_err(status_error(Code::Unauthenticated)),
            RagError::Authentication { .. }
        ));
        assert!(matches!(
            QdrantVectorIndex::map_err(status_error(Code::PermissionDenied)),
            RagError::Authentication { .. }
        ));
        assert!(QdrantVectorIndex::map_err(status_error(Code::Unavailable)).is_retryable());
        assert!(QdrantVectorIndex::map_err(status_error(Code::DeadlineExceeded)).is_retryable());
        assert!(matches!(
            QdrantVectorIndex::map_err(status_error(Code::InvalidArgument)),
            RagError::Storage { .. }
        ));
    }

    #[test]
    fn rate_limits_are_transient() {
        assert!(QdrantVectorIndex::map_err(status_error(Code::ResourceExhausted)).is_retryable());

        let mut status = Status::new(Code::ResourceExhausted, "too many requests");
        status.metadata_mut().insert("retry-after", "1".parse().unwrap());
        let err: QdrantError = status.into();
        let mapped = QdrantVectorIndex::map_err(err);
        assert_eq!(mapped.kind(), crate::error::ErrorKind::TransientNetwork);
        assert!(mapped.is_retryable());

        let err = QdrantError::ResourceExhaustedError {
            status: Status::new(Code::ResourceExhausted, "slow down"),
            retry_after_seconds: 3,
        };
        match QdrantVectorIndex::map_err(err) {
            RagError::TransientNetwork { message, .. } => {
                assert!(message.contains("slow down"), "{message}");
                assert!(message.contains("retry after 3s"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn distances_round_trip() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::DotProduct, DistanceMetric::Euclidean] {
            let distance = QdrantVectorIndex::to_distance(metric) as i32;
            assert_eq!(QdrantVectorIndex::from_distance(distance), Some(metric));
        }
    }

    #[test]
    fn points_carry_text_and_metadata() {
        let record = VectorRecord {
            id: crate::document::record_id("a.pdf", Some(1), 0),
            embedding: vec![0.1, 0.2],
            text: "passage".into(),
            metadata: HashMap::from([("page".into(), "1".into())]),
        };
        let point = QdrantVectorIndex::to_point(&record).unwrap();
        assert_eq!(
            point.payload.get("text").and_then(QdrantVectorIndex::extract_string).as_deref(),
            Some("passage")
        );
    }

    #[test]
    fn connect_does_not_touch_the_network() {
        let index = QdrantVectorIndex::connect(
            "http://localhost:6334",
            None,
            Duration::from_secs(1),
        );
        assert!(index.is_ok());
    }
}
