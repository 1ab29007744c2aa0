//! Query-time retrieval: embed the query, then ask one vector index.

use std::sync::Arc;

use tracing::debug;

use crate::document::QueryResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorIndex;

/// Retrieves the passages most relevant to a query from one collection.
///
/// Holds no cache; every call embeds the query and queries the index, and the
/// index's result is returned unchanged.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl Retriever {
    /// Create a retriever over `collection` of `index`.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self { embedder, index, collection: collection.into() }
    }

    /// The collection this retriever queries.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return up to `k` passages for `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures and every [`VectorIndex::query`] error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<QueryResult> {
        let embedding = self.embedder.embed(query).await?;
        let results = self.index.query(&self.collection, &embedding, k).await?;
        debug!(
            backend = self.index.backend(),
            collection = %self.collection,
            k,
            result_count = results.len(),
            "retrieved passages"
        );
        Ok(results)
    }
}
