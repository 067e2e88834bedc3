//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only view the index manager and the
//! retriever have of storage, enabling pluggable backends:
//!
//! - [`SqliteIndex`] — persisted under `embedding.index_path`; used by the CLI and server.
//! - [`InMemoryIndex`] — ephemeral; used by tests.
//!
//! Both rank by brute-force cosine similarity. Implementations must be
//! `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Chunk, RetrievedChunk};

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores `chunks` with their embeddings (same length, same order).
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Returns up to `k` entries most similar to `vector`, best first.
    /// Equal scores keep insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Texts of every stored entry.
    async fn stored_texts(&self) -> Result<HashSet<String>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

fn check_lengths(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != embeddings.len() {
        bail!(
            "chunk/embedding count mismatch: {} chunks, {} embeddings",
            chunks.len(),
            embeddings.len()
        );
    }
    Ok(())
}

/// Sorts by descending score (stable) and keeps the first `k`.
fn top_k(mut scored: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
