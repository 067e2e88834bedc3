//! Question → ranked chunks.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::models::RetrievedChunk;
use crate::store::VectorIndex;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Chunks relevant to `query`, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>>;
}

/// Embeds the query and takes the `top_k` nearest entries of the index.
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        self.index.query(&vector, self.top_k).await
    }
}
