//! Stub capabilities shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use docqa::app::Components;
use docqa::config::Config;
use docqa::embedding::EmbeddingProvider;
use docqa::llm::LanguageModel;
use docqa::ocr::DisabledOcr;

const VOCABULARY: [&str; 4] = ["protein", "cell", "gene", "drug"];

/// One dimension per vocabulary word plus a constant bias dimension.
/// Remembers every text it embeds.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub embedded: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// Replies with a fixed string and records every prompt.
pub struct RecordingModel {
    pub prompts: Mutex<Vec<String>>,
    reply: String,
}

impl RecordingModel {
    pub fn new(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub fn components(embedder: Arc<KeywordEmbedder>, model: Arc<RecordingModel>) -> Components {
    Components {
        ocr: Arc::new(DisabledOcr),
        embedder,
        llm: model,
    }
}

/// Library under `root/docs`, record and index under `root/data`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.library.path = root.join("docs");
    config.library.record_file = root.join("data/ingested.json");
    config.library.chunk_size = 200;
    config.library.chunk_overlap = 0;
    config.embedding.index_path = root.join("data/index");
    config.infer.batch = 2;
    config.infer.prompt_lang = "bio_qa_en".to_string();
    config.retriever.top_k = 2;
    std::fs::create_dir_all(&config.library.path).unwrap();
    config
}
