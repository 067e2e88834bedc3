//! Incremental index maintenance.
//!
//! [`IndexManager::build_or_update`] creates the persisted index on first
//! run and afterwards adds only chunks whose exact text is not stored yet.
//! Embedding requests are sent in batches of `infer.batch` texts, one batch
//! at a time.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::models::Chunk;
use crate::store::{SqliteIndex, VectorIndex};

pub struct IndexManager {
    embedder: Arc<dyn EmbeddingProvider>,
    batch: usize,
}

impl IndexManager {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, batch: usize) -> Self {
        Self {
            embedder,
            batch: batch.max(1),
        }
    }

    /// Opens (or creates) the index under `index_path` and adds the chunks it
    /// does not already hold. An existing index that cannot be opened is an
    /// error; it is never silently rebuilt.
    pub async fn build_or_update(
        &self,
        index_path: &Path,
        chunks: &[Chunk],
    ) -> Result<Arc<dyn VectorIndex>> {
        let index = self.open_or_create(index_path).await?;
        self.update(&index, chunks).await?;
        Ok(Arc::new(index))
    }

    /// The persisted index for the configured embedder, created empty if
    /// `index_path` holds none.
    ///
    /// An embedder without dimensions (the disabled provider) never creates
    /// an index: its metadata would pin the index to a model that cannot
    /// embed anything.
    pub async fn open_or_create(&self, index_path: &Path) -> Result<SqliteIndex> {
        let model = self.embedder.model_name();
        let dims = self.embedder.dims();

        if SqliteIndex::exists(index_path) {
            debug!(path = %index_path.display(), "opening index");
            Ok(SqliteIndex::open(index_path, model, dims).await?)
        } else if dims == 0 {
            bail!(
                "Embedding provider '{}' is disabled or reports 0 dimensions; \
                 not creating an index at {}. Set [embedding] provider in config.",
                model,
                index_path.display()
            )
        } else {
            info!(path = %index_path.display(), model, dims, "creating index");
            SqliteIndex::create(index_path, model, dims).await
        }
    }

    /// Embeds and adds the chunks whose text is absent from `index`.
    /// Returns how many were added.
    pub async fn update(&self, index: &dyn VectorIndex, chunks: &[Chunk]) -> Result<usize> {
        let stored = index.stored_texts().await?;
        let mut seen: HashSet<&str> = HashSet::new();
        let fresh: Vec<&Chunk> = chunks
            .iter()
            .filter(|&c| !stored.contains(&c.text) && seen.insert(c.text.as_str()))
            .collect();

        if fresh.is_empty() {
            debug!(candidates = chunks.len(), "index already up to date");
            return Ok(0);
        }

        for (i, batch) in fresh.chunks(self.batch).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            let owned: Vec<Chunk> = batch.iter().map(|c| (*c).clone()).collect();
            index.add(&owned, &embeddings).await?;
            debug!(batch = i, size = batch.len(), "embedded batch");
        }

        info!(
            added = fresh.len(),
            skipped = chunks.len() - fresh.len(),
            "index updated"
        );
        Ok(fresh.len())
    }
}
