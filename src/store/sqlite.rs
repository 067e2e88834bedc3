//! SQLite-backed [`VectorIndex`].
//!
//! The index is a directory holding one database file, `index.sqlite`, with
//! two tables:
//!
//! - `index_meta` — key/value pairs recording the embedding model and
//!   dimensionality the index was built with.
//! - `entries` — one row per stored chunk with its embedding as a
//!   little-endian `f32` BLOB.
//!
//! [`SqliteIndex::create`] builds a new index; [`SqliteIndex::open`] loads an
//! existing one and fails with [`IndexError`] when the file is unreadable,
//! not an index, or built for a different embedder. Every `add` commits in a
//! single transaction, so there is no separate save step.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk};

use super::{check_lengths, top_k, VectorIndex};

pub const INDEX_FILE: &str = "index.sqlite";
const SCHEMA_VERSION: &str = "1";

pub struct SqliteIndex {
    pool: SqlitePool,
    path: PathBuf,
}

async fn connect(file: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

impl SqliteIndex {
    /// Whether `dir` holds an index file.
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Creates a new, empty index in `dir` for the given embedder.
    pub async fn create(dir: &Path, model: &str, dims: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;
        let file = dir.join(INDEX_FILE);
        let pool = connect(&file, true)
            .await
            .with_context(|| format!("Failed to create index: {}", file.display()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                source_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_fingerprint ON entries(fingerprint)")
            .execute(&pool)
            .await?;

        let mut tx = pool.begin().await?;
        for (key, value) in [
            ("schema_version", SCHEMA_VERSION.to_string()),
            ("model", model.to_string()),
            ("dims", dims.to_string()),
        ] {
            sqlx::query(
                r#"
                INSERT INTO index_meta (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Self { pool, path: file })
    }

    /// Opens the index in `dir` and checks it was built for `model`/`dims`.
    pub async fn open(dir: &Path, model: &str, dims: usize) -> Result<Self, IndexError> {
        let file = dir.join(INDEX_FILE);
        let pool = connect(&file, false).await.map_err(|e| IndexError::Open {
            path: file.clone(),
            message: e.to_string(),
        })?;

        let corrupt = |message: String| IndexError::Corrupt {
            path: file.clone(),
            message,
        };

        let rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&pool)
            .await
            .map_err(|e| corrupt(e.to_string()))?;
        let mut found_model = None;
        let mut found_dims = None;
        for row in rows {
            let key: String = row.try_get("key").map_err(|e| corrupt(e.to_string()))?;
            let value: String = row.try_get("value").map_err(|e| corrupt(e.to_string()))?;
            match key.as_str() {
                "model" => found_model = Some(value),
                "dims" => found_dims = value.parse::<usize>().ok(),
                _ => {}
            }
        }
        let (Some(found_model), Some(found_dims)) = (found_model, found_dims) else {
            return Err(corrupt("missing model metadata".to_string()));
        };

        sqlx::query("SELECT COUNT(*) FROM entries")
            .fetch_one(&pool)
            .await
            .map_err(|e| corrupt(e.to_string()))?;

        if found_model != model || found_dims != dims {
            return Err(IndexError::Incompatible {
                path: file,
                found_model,
                found_dims,
                expected_model: model.to_string(),
                expected_dims: dims,
            });
        }

        Ok(Self { pool, path: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, embeddings)?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(embeddings) {
            sqlx::query(
                r#"
                INSERT INTO entries (id, text, source_id, sequence_index, fingerprint, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.text)
            .bind(&chunk.source_id)
            .bind(chunk.sequence_index as i64)
            .bind(&chunk.fingerprint)
            .bind(vec_to_blob(vector))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            "SELECT text, source_id, sequence_index, fingerprint, embedding FROM entries ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let sequence_index: i64 = row.try_get("sequence_index")?;
            scored.push(RetrievedChunk {
                score: cosine_similarity(vector, &blob_to_vec(&blob)),
                chunk: Chunk {
                    text: row.try_get("text")?,
                    source_id: row.try_get("source_id")?,
                    sequence_index: sequence_index.max(0) as usize,
                    fingerprint: row.try_get("fingerprint")?,
                },
            });
        }
        Ok(top_k(scored, k))
    }

    async fn stored_texts(&self) -> Result<HashSet<String>> {
        let texts: Vec<String> = sqlx::query_scalar("SELECT text FROM entries")
            .fetch_all(&self.pool)
            .await?;
        Ok(texts.into_iter().collect())
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
