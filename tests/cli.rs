use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("alpha.md"),
        "# Alpha\n\nThe alpha document describes protein folding.\n\nIt mentions chaperones.",
    )
    .unwrap();
    fs::write(
        docs.join("gamma.txt"),
        "Gamma notes about cell culture and growth media.",
    )
    .unwrap();
    fs::write(docs.join("archive.zip"), b"PK\x03\x04").unwrap();

    let config_content = format!(
        r#"[logging]
logfile = "{root}/logs/docqa.log"

[library]
path = "{root}/docs"
record_file = "{root}/data/ingested.json"
chunk_size = 200
chunk_overlap = 20

[embedding]
provider = "disabled"
index_path = "{root}/data/index"

[ocr]
engine = "disabled"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(docqa_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["ingest", "chat", "serve"] {
        assert!(stdout.contains(cmd), "--help missing {}: {}", cmd, stdout);
    }
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry run"));
    assert!(stdout.contains("files processed: 2"));
    assert!(stdout.contains("files failed:    1"));

    assert!(!tmp.path().join("data/ingested.json").exists());
    assert!(!tmp.path().join("data/index").exists());
    assert!(tmp.path().join("logs/docqa.log").exists());
}

#[test]
fn test_ingest_without_embedder_fails_and_records_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest"]);
    assert!(!success, "ingest should fail: stdout={}", stdout);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
    assert!(!tmp.path().join("data/ingested.json").exists());
}

#[test]
fn test_ingest_without_embedder_creates_no_index() {
    let (tmp, config_path) = setup_test_env();
    let docs = tmp.path().join("docs");
    fs::remove_dir_all(&docs).unwrap();
    fs::create_dir_all(&docs).unwrap();

    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest"]);
    assert!(!success, "ingest should fail: stdout={}", stdout);
    assert!(stderr.contains("not creating an index"), "stderr={}", stderr);
    assert!(!tmp.path().join("data/index/index.sqlite").exists());
}

#[test]
fn test_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_docqa(&tmp.path().join("nope.toml"), &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[library]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["ingest", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr={}", stderr);
}
