//! In-memory [`VectorIndex`] implementation for tests and ephemeral runs.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, RetrievedChunk};

use super::{check_lengths, top_k, VectorIndex};

struct StoredEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<StoredEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, embeddings)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.extend(
            chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| StoredEntry {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                }),
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let scored = entries
            .iter()
            .map(|e| RetrievedChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();
        Ok(top_k(scored, k))
    }

    async fn stored_texts(&self) -> Result<HashSet<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.iter().map(|e| e.chunk.text.clone()).collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}
