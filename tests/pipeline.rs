mod common;

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use common::{components, test_config, KeywordEmbedder, RecordingModel};
use docqa::app::{sync_library, App};
use docqa::error::IndexError;
use docqa::history::{ChatHistory, MAX_TURNS};
use docqa::ingest::ingest;
use docqa::ocr::DisabledOcr;
use docqa::prompts::DEFAULT_PROMPT_KEY;
use docqa::record::IngestionRecord;
use docqa::store::sqlite::INDEX_FILE;
use docqa::store::VectorIndex;

#[test]
fn repeated_sentence_collapses_to_one_chunk() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.library.chunk_size = 12;
    config.library.chunk_overlap = 0;
    fs::write(config.library.path.join("hello.txt"), "Hello world. Hello world.").unwrap();

    let report = ingest(&config.library, &DisabledOcr, false).unwrap();
    assert_eq!(report.chunks.len(), 1);
    assert_eq!(report.chunks[0].text, "Hello world.");
    assert_eq!(report.chunks[0].source_id, "hello.txt");

    let record = IngestionRecord::load(&config.library.record_file).unwrap();
    assert!(record.contains("hello.txt"));
}

#[test]
fn zip_files_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(config.library.path.join("bundle.zip"), b"PK\x03\x04junk").unwrap();
    fs::write(config.library.path.join("notes.txt"), "gene notes").unwrap();

    let report = ingest(&config.library, &DisabledOcr, false).unwrap();
    assert!(report.chunks.iter().all(|c| c.source_id != "bundle.zip"));
    assert_eq!(report.processed, vec!["notes.txt"]);

    let record = IngestionRecord::load(&config.library.record_file).unwrap();
    assert!(!record.contains("bundle.zip"));
}

#[test]
fn second_ingest_of_unchanged_library_is_empty() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(config.library.path.join("a.txt"), "Cells divide.\n\nGenes mutate.").unwrap();
    fs::write(config.library.path.join("b.md"), "# Drugs\n\nDrugs bind proteins.").unwrap();

    let first = ingest(&config.library, &DisabledOcr, false).unwrap();
    assert!(!first.chunks.is_empty());
    let record_before = fs::read(&config.library.record_file).unwrap();

    let second = ingest(&config.library, &DisabledOcr, false).unwrap();
    assert!(second.chunks.is_empty());
    assert_eq!(second.skipped, 2);
    assert_eq!(fs::read(&config.library.record_file).unwrap(), record_before);
}

#[test]
fn chunk_fingerprints_are_distinct_within_a_run() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.library.chunk_size = 40;
    let paragraph = "Protein folding is assisted by chaperones.";
    fs::write(
        config.library.path.join("a.txt"),
        format!("{p}\n\n{p}\n\nA different paragraph entirely.", p = paragraph),
    )
    .unwrap();
    fs::write(config.library.path.join("b.txt"), paragraph).unwrap();

    let report = ingest(&config.library, &DisabledOcr, true).unwrap();
    let fingerprints: HashSet<&str> =
        report.chunks.iter().map(|c| c.fingerprint.as_str()).collect();
    assert_eq!(fingerprints.len(), report.chunks.len());
}

#[tokio::test]
async fn new_files_are_added_incrementally() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.library.chunk_size = 20;
    fs::write(config.library.path.join("a.txt"), "Protein structure.").unwrap();
    fs::write(config.library.path.join("b.txt"), "Cell membranes.").unwrap();

    let embedder = Arc::new(KeywordEmbedder::default());
    let model = Arc::new(RecordingModel::new("ok"));
    let parts = components(embedder.clone(), model);

    let (outcome, _) = sync_library(&config, &parts, false).await.unwrap();
    assert_eq!(outcome.indexed, 2);
    assert_eq!(outcome.index_len, Some(2));

    // b.txt's text reappears in a new file; only the new text is embedded.
    fs::write(config.library.path.join("c.txt"), "Cell membranes.\n\nGene therapy.").unwrap();
    let (outcome, _) = sync_library(&config, &parts, false).await.unwrap();
    assert_eq!(outcome.report.processed, vec!["c.txt"]);
    assert_eq!(outcome.index_len, Some(3));

    let embedded = embedder.embedded();
    assert_eq!(embedded.len(), 3);
    assert_eq!(embedded.last().map(String::as_str), Some("Gene therapy."));

    let (outcome, _) = sync_library(&config, &parts, false).await.unwrap();
    assert_eq!(outcome.indexed, 0);
    assert_eq!(embedder.embedded().len(), 3);
}

#[tokio::test]
async fn failed_index_update_leaves_files_unrecorded() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(config.library.path.join("a.txt"), "Protein structure.").unwrap();

    let parts = docqa::app::Components {
        ocr: Arc::new(DisabledOcr),
        embedder: Arc::new(docqa::embedding::DisabledProvider),
        llm: Arc::new(RecordingModel::new("ok")),
    };
    assert!(sync_library(&config, &parts, false).await.is_err());
    assert!(!config.library.record_file.exists());
}

#[tokio::test]
async fn corrupt_index_is_fatal_not_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(config.library.path.join("a.txt"), "Protein structure.").unwrap();
    fs::create_dir_all(&config.embedding.index_path).unwrap();
    let index_file = config.embedding.index_path.join(INDEX_FILE);
    fs::write(&index_file, b"this is not a database").unwrap();

    let parts = components(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingModel::new("ok")),
    );
    let err = match App::start_with(config.clone(), parts).await {
        Ok(_) => panic!("corrupt index must not load"),
        Err(e) => e,
    };
    assert!(err.downcast_ref::<IndexError>().is_some(), "{:#}", err);
    assert_eq!(fs::read(&index_file).unwrap(), b"this is not a database");
    assert!(!config.library.record_file.exists());
}

#[tokio::test]
async fn index_built_for_another_embedder_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    docqa::store::SqliteIndex::create(&config.embedding.index_path, "other-model", 768)
        .await
        .unwrap();

    let parts = components(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingModel::new("ok")),
    );
    let err = match sync_library(&config, &parts, false).await {
        Ok(_) => panic!("incompatible index must not load"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::Incompatible { .. })
    ));
}

#[tokio::test]
async fn app_answers_from_retrieved_chunks() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(
        config.library.path.join("proteins.txt"),
        "Protein folding is assisted by chaperones.",
    )
    .unwrap();
    fs::write(
        config.library.path.join("drugs.txt"),
        "Drug trials run in phases.",
    )
    .unwrap();

    let model = Arc::new(RecordingModel::new("Chaperones help proteins fold."));
    let parts = components(Arc::new(KeywordEmbedder::default()), model.clone());
    let app = App::start_with(config, parts).await.unwrap();
    assert_eq!(app.index().len().await.unwrap(), 2);

    let (answer, history) = app
        .chain()
        .answer("How does protein folding work?", ChatHistory::new())
        .await
        .unwrap();
    assert_eq!(answer, "Chaperones help proteins fold.");
    assert_eq!(history.len(), 1);

    // No history: no rewrite call, one refine call per retrieved chunk (top_k = 2),
    // best match first.
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Protein folding is assisted by chaperones."));
    assert!(prompts[1].contains("Drug trials run in phases."));
}

#[tokio::test]
async fn history_stays_bounded_across_turns() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(config.library.path.join("a.txt"), "Gene regulation.").unwrap();

    let model = Arc::new(RecordingModel::new("an answer"));
    let parts = components(Arc::new(KeywordEmbedder::default()), model);
    let app = App::start_with(config, parts).await.unwrap();
    let chain = app.chain();

    let mut history = ChatHistory::new();
    for i in 0..(MAX_TURNS + 3) {
        let (_, updated) = chain.answer(&format!("question {}", i), history).await.unwrap();
        history = updated;
        assert!(history.len() <= MAX_TURNS);
    }
    let questions: Vec<String> = history.turns().map(|t| t.question.clone()).collect();
    let expected: Vec<String> = (3..MAX_TURNS + 3).map(|i| format!("question {}", i)).collect();
    assert_eq!(questions, expected);
}

#[tokio::test]
async fn unknown_prompt_language_falls_back() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.infer.prompt_lang = "no_such_language".to_string();

    let parts = components(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingModel::new("ok")),
    );
    let app = App::start_with(config, parts).await.unwrap();
    assert_eq!(app.chain().templates().key, DEFAULT_PROMPT_KEY);
}
