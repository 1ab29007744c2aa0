//! Local persistent vector index backed by SQLite.
//!
//! Provides [`SqliteVectorIndex`] which implements [`VectorIndex`] using
//! [sqlx](https://docs.rs/sqlx). All collections of one index live in a single
//! database file inside a directory; reopening the directory recovers every
//! collection and record. Search is a brute-force scan scored in process.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::sqlite::SqliteVectorIndex;
//!
//! let index = SqliteVectorIndex::open("./pdfqa-data").await?;
//! index.create_collection("docs", CollectionSchema::cosine(384)).await?;
//! index.upsert("docs", &records).await?;
//! let results = index.query("docs", &query_embedding, 3).await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::document::{QueryResult, ScoredPassage, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{
    CollectionSchema, DEFAULT_BATCH_SIZE, VectorIndex, batch_failure, batches, ensure_top_k, rank,
};

const BACKEND: &str = "sqlite";

/// A [`VectorIndex`] stored in a SQLite database on local disk.
///
/// The database has two tables: `collections` (name, dimension, metric) and
/// `records` (collection, id, text, metadata JSON, little-endian f32 blob).
/// Each upsert batch is written in one transaction.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    db_path: PathBuf,
    batch_size: usize,
}

impl SqliteVectorIndex {
    /// Name of the database file inside the storage directory.
    pub const FILE_NAME: &'static str = "pdfqa.sqlite";

    /// Open (or create) the index stored in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] if the directory or database cannot be
    /// created or opened.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            RagError::storage(BACKEND, format!("cannot create '{}': {e}", dir.display()))
        })?;
        let db_path = dir.join(Self::FILE_NAME);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(Self::map_err)?;

        let index = Self { pool, db_path, batch_size: DEFAULT_BATCH_SIZE };
        index.init_schema().await?;
        debug!(path = %index.db_path.display(), "opened sqlite vector index");
        Ok(index)
    }

    /// Set the number of records written per transaction.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn map_err(e: sqlx::Error) -> RagError {
        RagError::storage(BACKEND, e.to_string())
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    async fn schema(&self, name: &str) -> Result<Option<CollectionSchema>> {
        let row = sqlx::query("SELECT dimension, metric FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let dimension: i64 = row.try_get("dimension").map_err(Self::map_err)?;
        let metric: String = row.try_get("metric").map_err(Self::map_err)?;
        let metric = metric.parse().map_err(|_| {
            RagError::storage(BACKEND, format!("collection '{name}' has unknown metric '{metric}'"))
        })?;
        Ok(Some(CollectionSchema { dimension: dimension as usize, metric }))
    }

    async fn require_schema(&self, name: &str) -> Result<CollectionSchema> {
        self.schema(name).await?.ok_or_else(|| RagError::not_found(BACKEND, name))
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

        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        for record in batch {
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|e| RagError::storage(BACKEND, format!("metadata encoding: {e}")))?;
            sqlx::query(
                "INSERT INTO records (collection, id, text, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding",
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(&metadata)
            .bind(Self::serialize_embedding(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        }
        tx.commit().await.map_err(Self::map_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        if schema.dimension == 0 {
            return Err(RagError::Configuration("collection dimension must be positive".into()));
        }
        if let Some(existing) = self.schema(name).await? {
            existing.ensure_matches(name, &schema)?;
            debug!(collection = name, "sqlite collection already exists, skipping creation");
            return Ok(());
        }

        sqlx::query("INSERT INTO collections (name, dimension, metric) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(schema.dimension as i64)
            .bind(schema.metric.as_str())
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimension = schema.dimension, metric = %schema.metric, "created sqlite collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;

        sqlx::query("DELETE FROM records WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        let removed = sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.map_err(Self::map_err)?;
            return Err(RagError::not_found(BACKEND, name));
        }
        tx.commit().await.map_err(Self::map_err)?;

        debug!(collection = name, "deleted sqlite collection");
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
        }

        debug!(collection, count = records.len(), "upserted records to sqlite");
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<QueryResult> {
        ensure_top_k(k)?;
        let schema = self.require_schema(collection).await?;
        schema.ensure_dimension(collection, embedding)?;

        let rows = sqlx::query(
            "SELECT id, text, metadata, embedding FROM records WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Vec<u8> = row.try_get("embedding").map_err(Self::map_err)?;
            let stored = Self::deserialize_embedding(&bytes);
            let metadata: String = row.try_get("metadata").map_err(Self::map_err)?;
            let metadata: HashMap<String, String> = serde_json::from_str(&metadata)
                .map_err(|e| RagError::storage(BACKEND, format!("corrupt metadata: {e}")))?;
            scored.push(ScoredPassage {
                id: row.try_get("id").map_err(Self::map_err)?,
                text: row.try_get("text").map_err(Self::map_err)?,
                score: schema.metric.score(embedding, &stored),
                metadata,
            });
        }

        let results = rank(scored, k);
        debug!(collection, k, result_count = results.len(), "sqlite query completed");
        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.require_schema(collection).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(count as usize)
    }
}
