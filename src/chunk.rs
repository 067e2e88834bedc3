//! Recursive separator text chunker.
//!
//! Splits normalized text into overlapping windows of at most `chunk_size`
//! characters. Splitting tries paragraph breaks first, then line breaks, then
//! spaces, and finally individual characters, so that windows end on the
//! coarsest boundary that fits. Consecutive windows share up to
//! `chunk_overlap` characters of trailing context.
//!
//! Each chunk carries a SHA-256 fingerprint of its whitespace-canonicalized
//! text, used to drop duplicate content across an ingestion run.

use std::collections::{HashSet, VecDeque};

use sha2::{Digest, Sha256};

use crate::models::Chunk;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Window settings, both measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// `chunk_overlap` must be smaller than `chunk_size`; config validation
    /// guarantees this for configured values.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Splits `text` into window strings. Empty or whitespace-only text
    /// yields nothing.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, SEPARATORS)
    }

    /// Splits `text` and wraps the windows as chunks of `source_id`,
    /// numbering them from `first_index`.
    pub fn chunk_text(&self, source_id: &str, text: &str, first_index: usize) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| make_chunk(source_id, first_index + i, piece))
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len() - 1);
        let separator = separators[idx];
        let rest = &separators[idx + 1..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if rest.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, rest));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    /// Greedily packs pieces into windows, carrying up to `chunk_overlap`
    /// characters of the previous window into the next.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |total: usize, current: &VecDeque<&str>| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };

            if joined_len(total, &current) > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current, separator);
                while total > self.chunk_overlap
                    || (joined_len(total, &current) > self.chunk_size && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
        }
        push_window(&mut windows, &current, separator);
        windows
    }
}

fn push_window(windows: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Lowercase hex SHA-256 of `text` with whitespace runs collapsed and trimmed.
pub fn fingerprint(text: &str) -> String {
    let canonical = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(source_id: &str, index: usize, text: String) -> Chunk {
    Chunk {
        fingerprint: fingerprint(&text),
        source_id: source_id.to_string(),
        sequence_index: index,
        text,
    }
}

/// Keeps the first chunk for each fingerprint, preserving order.
pub fn dedup_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|c| seen.insert(c.fingerprint.clone()))
        .collect()
}
