//! Application bootstrap.
//!
//! Builds every component from one [`Config`], runs ingestion, brings the
//! index up to date and assembles the [`ConversationalChain`]. The CLI and
//! the HTTP server both start from [`App::start`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::chain::ConversationalChain;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::index::IndexManager;
use crate::ingest::{self, IngestReport};
use crate::llm::{create_model, LanguageModel};
use crate::ocr::{create_engine, OcrEngine};
use crate::retriever::VectorRetriever;
use crate::store::VectorIndex;

/// The external capabilities the pipeline talks to.
#[derive(Clone)]
pub struct Components {
    pub ocr: Arc<dyn OcrEngine>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LanguageModel>,
}

impl Components {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            ocr: Arc::from(create_engine(&config.ocr)?),
            embedder: Arc::from(create_provider(&config.embedding)?),
            llm: Arc::from(create_model(&config.llm)?),
        })
    }
}

/// Result of [`sync_library`].
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: IngestReport,
    /// Chunks newly embedded into the index (0 on a dry run).
    pub indexed: usize,
    /// Entries held by the index afterwards, if it was opened.
    pub index_len: Option<usize>,
}

/// Ingests the library and adds the new chunks to the persisted index.
///
/// Files are only added to the ingestion record after the index update
/// succeeded. With `dry_run` nothing is written and the index is not touched.
pub async fn sync_library(
    config: &Config,
    components: &Components,
    dry_run: bool,
) -> Result<(SyncOutcome, Option<Arc<dyn VectorIndex>>)> {
    let library = config.library.clone();
    let ocr = components.ocr.clone();
    let report = tokio::task::spawn_blocking(move || ingest::ingest(&library, ocr.as_ref(), true))
        .await
        .context("ingestion task panicked")??;

    if dry_run {
        let outcome = SyncOutcome {
            report,
            indexed: 0,
            index_len: None,
        };
        return Ok((outcome, None));
    }

    let manager = IndexManager::new(components.embedder.clone(), config.infer.batch);
    let index_path = &config.embedding.index_path;
    let index = manager
        .open_or_create(index_path)
        .await
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;
    let indexed = manager.update(&index, &report.chunks).await?;
    let index_len = index.len().await?;
    ingest::commit(&config.library, &report.processed)?;

    info!(
        files = report.processed.len(),
        indexed,
        index_len,
        index = %index.path().display(),
        "library synced"
    );

    let outcome = SyncOutcome {
        report,
        indexed,
        index_len: Some(index_len),
    };
    let index: Arc<dyn VectorIndex> = Arc::new(index);
    Ok((outcome, Some(index)))
}

/// A ready-to-answer application: library synced, index open, chain built.
pub struct App {
    config: Config,
    chain: Arc<ConversationalChain>,
    index: Arc<dyn VectorIndex>,
}

impl App {
    pub async fn start(config: Config) -> Result<Self> {
        let components = Components::from_config(&config)?;
        Self::start_with(config, components).await
    }

    pub async fn start_with(config: Config, components: Components) -> Result<Self> {
        info!("starting");
        let (_, index) = sync_library(&config, &components, false).await?;
        let index = index.context("index was not opened")?;

        let retriever = VectorRetriever::new(
            index.clone(),
            components.embedder.clone(),
            config.retriever.top_k,
        );
        let chain = ConversationalChain::new(
            components.llm.clone(),
            Arc::new(retriever),
            &config.infer.prompt_lang,
        );
        info!(
            prompt_lang = chain.templates().key,
            llm = components.llm.model_name(),
            embedder = components.embedder.model_name(),
            "ready"
        );

        Ok(Self {
            config,
            chain: Arc::new(chain),
            index,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chain(&self) -> Arc<ConversationalChain> {
        self.chain.clone()
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }
}
