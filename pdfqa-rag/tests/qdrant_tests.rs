//! Integration tests for the Qdrant vector index.
//!
//! Tests marked `#[ignore]` need a running Qdrant reachable at `QDRANT_URL`
//! (default `http://localhost:6334`, API key from `QDRANT_API_KEY`):
//!
//! ```text
//! docker run -p 6334:6334 qdrant/qdrant
//! cargo test -p pdfqa-rag --test qdrant_tests -- --ignored
//! ```

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pdfqa_rag::document::{VectorRecord, record_id};
use pdfqa_rag::error::RagError;
use pdfqa_rag::qdrant::QdrantVectorIndex;
use pdfqa_rag::retry::RetryPolicy;
use pdfqa_rag::vectorstore::{CollectionSchema, DistanceMetric, VectorIndex};

const DIM: usize = 384;

fn index() -> QdrantVectorIndex {
    let url = std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
    let api_key = std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty());
    QdrantVectorIndex::connect(&url, api_key, Duration::from_secs(10)).unwrap()
}

/// A collection name no other test run uses.
fn collection(prefix: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("pdfqa-test-{prefix}-{nanos}")
}

/// A unit vector in `DIM` dimensions pointing mostly along `axis`.
fn embedding(axis: usize, spread: f32) -> Vec<f32> {
    let mut v = vec![spread; DIM];
    v[axis] = 1.0;
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

fn record(n: usize, text: &str, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: record_id("test.pdf", Some(1), n),
        embedding,
        text: text.to_string(),
        metadata: HashMap::from([("source".to_string(), "test.pdf".to_string())]),
    }
}

#[tokio::test]
async fn zero_k_is_rejected_before_any_request() {
    // Nothing listens here; a network attempt would surface as a transient error.
    let index = QdrantVectorIndex::connect("http://127.0.0.1:1", None, Duration::from_millis(200))
        .unwrap()
        .with_retry_policy(RetryPolicy::none());
    let err = index.query("docs", &embedding(0, 0.0), 0).await.unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)), "{err:?}");
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn top_three_of_five_are_ordered_and_bounded() {
    let index = index();
    let name = collection("top3");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    let records: Vec<_> =
        (0..5).map(|i| record(i, &format!("text {i}"), embedding(i, 0.01))).collect();
    index.upsert(&name, &records).await.unwrap();

    let results = index.query(&name, &embedding(2, 0.01), 3).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, records[2].id);
    assert_eq!(results[0].text, "text 2");
    assert_eq!(results[0].metadata["source"], "test.pdf");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn upsert_is_idempotent_and_keeps_latest_content() {
    let index = index();
    let name = collection("idempotent");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    let first = record(0, "old text", embedding(0, 0.0));
    index.upsert(&name, &[first.clone()]).await.unwrap();
    index.upsert(&name, &[first]).await.unwrap();
    index.upsert(&name, &[record(0, "new text", embedding(0, 0.0))]).await.unwrap();

    assert_eq!(index.count(&name).await.unwrap(), 1);
    let results = index.query(&name, &embedding(0, 0.0), 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "new text");

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn empty_collection_yields_empty_result() {
    let index = index();
    let name = collection("empty");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    assert!(index.query(&name, &embedding(0, 0.0), 3).await.unwrap().is_empty());
    index.upsert(&name, &[]).await.unwrap();
    assert_eq!(index.count(&name).await.unwrap(), 0);

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn missing_collection_is_not_found() {
    let index = index();
    let name = collection("missing");
    let err = index.query(&name, &embedding(0, 0.0), 3).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }), "{err:?}");
    let err = index.upsert(&name, &[record(0, "a", embedding(0, 0.0))]).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }), "{err:?}");
    let err = index.delete_collection(&name).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn recreating_with_another_schema_conflicts() {
    let index = index();
    let name = collection("schema");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    let err = index.create_collection(&name, CollectionSchema::cosine(768)).await.unwrap_err();
    assert!(matches!(err, RagError::SchemaConflict { .. }), "{err:?}");

    // A fresh client has no cached schema and must read it back from the server.
    let other = crate::index();
    let euclid = CollectionSchema { dimension: DIM, metric: DistanceMetric::Euclidean };
    assert!(matches!(
        other.create_collection(&name, euclid).await,
        Err(RagError::SchemaConflict { .. })
    ));
    assert_eq!(other.count(&name).await.unwrap(), 0);

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn wrong_dimension_is_a_schema_conflict() {
    let index = index();
    let name = collection("dimension");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    let err = index.upsert(&name, &[record(0, "a", vec![1.0; 8])]).await.unwrap_err();
    assert!(matches!(err, RagError::SchemaConflict { .. }), "{err:?}");
    let err = index.query(&name, &[1.0; 8], 3).await.unwrap_err();
    assert!(matches!(err, RagError::SchemaConflict { .. }), "{err:?}");

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn failed_batch_reports_its_offset_and_keeps_earlier_batches() {
    let index = index().with_batch_size(2).with_retry_policy(RetryPolicy::none());
    let name = collection("batches");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();

    let mut records: Vec<_> = (0..4).map(|i| record(i, "ok", embedding(i, 0.0))).collect();
    let mut bad = record(4, "bad", embedding(4, 0.0));
    bad.id = "not-a-point-id".to_string();
    records.push(bad);

    let err = index.upsert(&name, &records).await.unwrap_err();
    assert!(matches!(err, RagError::Storage { .. }), "{err:?}");
    assert_eq!(err.batch_offset(), Some(4));
    assert_eq!(index.count(&name).await.unwrap(), 4);

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn euclidean_scores_are_negated_distances() {
    let index = index();
    let name = collection("euclid");
    let schema = CollectionSchema { dimension: DIM, metric: DistanceMetric::Euclidean };
    index.create_collection(&name, schema).await.unwrap();

    let records: Vec<_> = (0..3).map(|i| record(i, "t", embedding(i, 0.0))).collect();
    index.upsert(&name, &records).await.unwrap();

    let results = index.query(&name, &embedding(1, 0.0), 3).await.unwrap();
    assert_eq!(results[0].id, records[1].id);
    assert!(results[0].score.abs() < 1e-4, "{}", results[0].score);
    assert!(results.iter().all(|r| r.score <= 1e-4));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    index.delete_collection(&name).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Qdrant server at QDRANT_URL"]
async fn delete_clears_cached_schema() {
    let index = index();
    let name = collection("delete");
    index.create_collection(&name, CollectionSchema::cosine(DIM)).await.unwrap();
    index.upsert(&name, &[record(0, "a", embedding(0, 0.0))]).await.unwrap();
    index.delete_collection(&name).await.unwrap();

    assert!(matches!(index.count(&name).await, Err(RagError::NotFound { .. })));
    assert!(matches!(index.delete_collection(&name).await, Err(RagError::NotFound { .. })));

    // Same name, new schema: the old cached schema must not linger.
    index.create_collection(&name, CollectionSchema::cosine(16)).await.unwrap();
    let err = index.query(&name, &embedding(0, 0.0), 1).await.unwrap_err();
    assert!(matches!(err, RagError::SchemaConflict { .. }), "{err:?}");

    index.delete_collection(&name).await.unwrap();
}
