//! Document ingestion pipeline.
//!
//! Walks the library directory, skips files already named in the
//! [`IngestionRecord`], extracts → normalizes → chunks each new file, drops
//! duplicate chunks across the run, and finally records the files that were
//! processed successfully.
//!
//! A file that fails at any step is logged and left out of both the output
//! and the record, so it is retried on the next run.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::{dedup_chunks, Chunker};
use crate::config::LibraryConfig;
use crate::extract::extract_file;
use crate::models::Chunk;
use crate::normalize::TextNormalizer;
use crate::ocr::OcrEngine;
use crate::record::IngestionRecord;

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// New chunks, in file order, duplicates removed.
    pub chunks: Vec<Chunk>,
    /// File names that were processed and recorded.
    pub processed: Vec<String>,
    /// `(file name, reason)` for every file that failed.
    pub failed: Vec<(String, String)>,
    /// Files skipped because the record already names them.
    pub skipped: usize,
}

/// Runs the pipeline over `library.path`.
///
/// With `dry_run` the record is read but never written.
pub fn ingest(library: &LibraryConfig, ocr: &dyn OcrEngine, dry_run: bool) -> Result<IngestReport> {
    let mut record = IngestionRecord::load(&library.record_file)?;
    let normalizer = TextNormalizer::new(library.header_patterns.as_deref())
        .with_context(|| "invalid library.header_patterns")?;
    let chunker = Chunker::new(library.chunk_size, library.chunk_overlap);

    let mut report = IngestReport::default();
    let mut chunks = Vec::new();

    for path in scan_library(library)? {
        let name = file_name(&path);
        if record.contains(&name) {
            report.skipped += 1;
            continue;
        }

        let docs = match extract_file(&path, library.max_extract_bytes, ocr) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping file");
                report.failed.push((name, e.to_string()));
                continue;
            }
        };

        let before = chunks.len();
        let mut next_index = 0;
        for doc in &docs {
            let text = normalizer.normalize(doc);
            let doc_chunks = chunker.chunk_text(&doc.source_id, &text, next_index);
            next_index += doc_chunks.len();
            chunks.extend(doc_chunks);
        }
        debug!(
            file = %path.display(),
            documents = docs.len(),
            chunks = chunks.len() - before,
            "extracted"
        );
        report.processed.push(name);
    }

    let total = chunks.len();
    report.chunks = if library.deduplicate {
        dedup_chunks(chunks)
    } else {
        chunks
    };

    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        skipped = report.skipped,
        chunks = report.chunks.len(),
        duplicates = total - report.chunks.len(),
        dry_run,
        "ingestion finished"
    );

    if !dry_run {
        commit_into(&mut record, library, &report.processed)?;
    }

    Ok(report)
}

/// Adds `processed` to the persisted record. Callers that ingest with
/// `dry_run` and index afterwards commit here once the index is durable, so a
/// failed index update leaves the files eligible for the next run.
pub fn commit(library: &LibraryConfig, processed: &[String]) -> Result<usize> {
    let mut record = IngestionRecord::load(&library.record_file)?;
    commit_into(&mut record, library, processed)
}

fn commit_into(
    record: &mut IngestionRecord,
    library: &LibraryConfig,
    processed: &[String],
) -> Result<usize> {
    if processed.is_empty() {
        return Ok(0);
    }
    let added = record.merge(processed.iter().cloned());
    if added > 0 {
        record.save(&library.record_file)?;
    }
    Ok(added)
}

/// Lists candidate files under the library root, sorted by path.
pub fn scan_library(library: &LibraryConfig) -> Result<Vec<PathBuf>> {
    let root = &library.path;
    if !root.exists() {
        bail!("Library directory does not exist: {}", root.display());
    }

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(library.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(library.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("invalid exclude glob: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::DisabledOcr;
    use std::fs;
    use tempfile::TempDir;

    fn library(tmp: &TempDir) -> LibraryConfig {
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        LibraryConfig {
            path: docs,
            record_file: tmp.path().join("ingested.json"),
            ..LibraryConfig::default()
        }
    }

    #[test]
    fn scan_is_sorted_and_honors_excludes() {
        let tmp = TempDir::new().unwrap();
        let mut lib = library(&tmp);
        lib.exclude_globs = vec!["**/*.log".to_string()];
        fs::create_dir_all(lib.path.join("sub")).unwrap();
        fs::create_dir_all(lib.path.join(".git")).unwrap();
        fs::write(lib.path.join("b.txt"), "b").unwrap();
        fs::write(lib.path.join("sub/a.md"), "a").unwrap();
        fs::write(lib.path.join("x.log"), "x").unwrap();
        fs::write(lib.path.join(".git/config"), "x").unwrap();

        let files = scan_library(&lib).unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(&lib.path).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rel, vec!["b.txt", "sub/a.md"]);
    }

    #[test]
    fn missing_library_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let lib = LibraryConfig {
            path: tmp.path().join("nope"),
            ..LibraryConfig::default()
        };
        assert!(ingest(&lib, &DisabledOcr, false).is_err());
    }

    #[test]
    fn sequence_index_counts_per_file() {
        let tmp = TempDir::new().unwrap();
        let mut lib = library(&tmp);
        lib.chunk_size = 10;
        lib.chunk_overlap = 0;
        fs::write(lib.path.join("a.txt"), "one two three four").unwrap();
        fs::write(lib.path.join("b.txt"), "five six").unwrap();

        let report = ingest(&lib, &DisabledOcr, false).unwrap();
        let ids: Vec<(&str, usize)> = report
            .chunks
            .iter()
            .map(|c| (c.source_id.as_str(), c.sequence_index))
            .collect();
        assert_eq!(ids, vec![("a.txt", 0), ("a.txt", 1), ("b.txt", 0)]);
    }

    #[test]
    fn dry_run_leaves_record_untouched() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        fs::write(lib.path.join("a.txt"), "content").unwrap();

        let report = ingest(&lib, &DisabledOcr, true).unwrap();
        assert_eq!(report.processed, vec!["a.txt"]);
        assert!(!lib.record_file.exists());
    }

    #[test]
    fn failures_are_reported_not_recorded() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        fs::write(lib.path.join("bad.docx"), "not a zip").unwrap();
        fs::write(lib.path.join("good.txt"), "fine").unwrap();

        let report = ingest(&lib, &DisabledOcr, false).unwrap();
        assert_eq!(report.processed, vec!["good.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad.docx");

        let record = IngestionRecord::load(&lib.record_file).unwrap();
        assert!(record.contains("good.txt"));
        assert!(!record.contains("bad.docx"));
    }

    #[test]
    fn commit_after_dry_run_records_files() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        fs::write(lib.path.join("a.txt"), "content").unwrap();

        let report = ingest(&lib, &DisabledOcr, true).unwrap();
        assert_eq!(commit(&lib, &report.processed).unwrap(), 1);
        assert_eq!(commit(&lib, &report.processed).unwrap(), 0);

        let again = ingest(&lib, &DisabledOcr, true).unwrap();
        assert!(again.chunks.is_empty());
        assert_eq!(again.skipped, 1);
    }

    #[test]
    fn dedup_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut lib = library(&tmp);
        lib.deduplicate = false;
        fs::write(lib.path.join("a.txt"), "same").unwrap();
        fs::write(lib.path.join("b.txt"), "same").unwrap();

        let report = ingest(&lib, &DisabledOcr, true).unwrap();
        assert_eq!(report.chunks.len(), 2);
    }

    #[test]
    fn scanned_pdfs_are_recorded_only_when_read() {
        use crate::extract::tests::{pdf_with_fax_image, pdf_with_flate_image, PngOcr};

        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        fs::write(lib.path.join("scan.pdf"), pdf_with_flate_image()).unwrap();
        fs::write(lib.path.join("fax.pdf"), pdf_with_fax_image()).unwrap();

        let report = ingest(&lib, &PngOcr, false).unwrap();
        assert_eq!(report.processed, vec!["scan.pdf"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "fax.pdf");
        assert_eq!(report.chunks.len(), 1);
        assert!(report.chunks[0].text.contains("recovered scan text"));

        let record = IngestionRecord::load(&lib.record_file).unwrap();
        assert!(record.contains("scan.pdf"));
        assert!(!record.contains("fax.pdf"));
    }
}
