//! Core data models used throughout docqa.
//!
//! These types represent the documents and chunks that flow through the
//! ingestion pipeline and back out of the vector index at question time.

use serde::{Deserialize, Serialize};

use crate::extract::FileFormat;

/// How the text of a [`RawDocument`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    NativeText,
    OcrExtracted,
}

/// Extracted text, either as one body or one entry per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Text(String),
    Pages(Vec<String>),
}

impl DocumentContent {
    /// Flattens the content. Pages are introduced by a `[Page N]` marker line;
    /// pages without text are left out but keep their numbering.
    pub fn text(&self) -> String {
        match self {
            DocumentContent::Text(text) => text.clone(),
            DocumentContent::Pages(pages) => pages
                .iter()
                .enumerate()
                .filter(|(_, page)| !page.trim().is_empty())
                .map(|(i, page)| format!("[Page {}]\n{}", i + 1, page.trim()))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Output of an extractor, before normalization.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub content: DocumentContent,
    pub source_id: String,
    pub content_kind: ContentKind,
    pub format: FileFormat,
}

/// A window of normalized text, the unit stored in and retrieved from the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub sequence_index: usize,
    /// SHA-256 (hex) of the whitespace-canonicalized text.
    pub fingerprint: String,
}

/// A chunk returned by a similarity query, best match first.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}
