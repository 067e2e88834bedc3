//! Persisted set of already-ingested file names.
//!
//! Stored as a sorted JSON array of strings. The set only grows: names are
//! merged in after a run and the file is rewritten through a temporary file
//! and a rename so a crash never leaves a truncated record.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionRecord {
    names: BTreeSet<String>,
}

impl IngestionRecord {
    /// Reads the record at `path`; a missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ingestion record: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let names: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ingestion record: {}", path.display()))?;
        Ok(Self {
            names: names.into_iter().collect(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Adds `names`; returns how many were new.
    pub fn merge<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.names.len();
        self.names.extend(names.into_iter().map(Into::into));
        self.names.len() - before
    }

    /// Writes the record atomically, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let names: Vec<&str> = self.names().collect();
        let json = serde_json::to_string_pretty(&names)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write ingestion record: {}", path.display()))?;
        Ok(())
    }
}
