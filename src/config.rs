//! TOML configuration.
//!
//! The file is parsed once into [`Config`]; every component receives only the
//! sub-structure it needs (for example [`LibraryConfig`] for ingestion), so
//! there is no ambient global configuration.
//!
//! ```toml
//! [logging]
//! logfile = "logs/docqa.log"
//!
//! [library]
//! path = "docs"
//! record_file = "ingested.json"
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [embedding]
//! provider = "ollama"
//! model_name = "nomic-embed-text"
//! dims = 768
//! index_path = "index"
//!
//! [infer]
//! batch = 32
//! prompt_lang = "bio_qa_zh"
//!
//! [llm]
//! provider = "ollama"
//! model_name = "qwen3:8b"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub infer: InferConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logfile")]
    pub logfile: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logfile: default_logfile(),
        }
    }
}

fn default_logfile() -> PathBuf {
    PathBuf::from("rag.log")
}

/// Source library settings consumed by the ingestion pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_library_path")]
    pub path: PathBuf,
    #[serde(default = "default_record_file")]
    pub record_file: PathBuf,
    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub deduplicate: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_extract_bytes")]
    pub max_extract_bytes: u64,
    /// Replaces the built-in OCR header/footer patterns when set.
    #[serde(default)]
    pub header_patterns: Option<Vec<String>>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
            record_file: default_record_file(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            deduplicate: true,
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_extract_bytes: default_max_extract_bytes(),
            header_patterns: None,
        }
    }
}

fn default_library_path() -> PathBuf {
    PathBuf::from("docs")
}
fn default_record_file() -> PathBuf {
    PathBuf::from("ingested.json")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_true() -> bool {
    true
}
fn default_max_extract_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model_name: None,
            dims: None,
            url: None,
            index_path: default_index_path(),
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("index")
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Inference settings shared by the embedding and generation paths.
#[derive(Debug, Deserialize, Clone)]
pub struct InferConfig {
    /// Accelerator hint for in-process backends; remote providers ignore it.
    #[serde(default = "default_device")]
    pub device: String,
    /// Embedding batch size (texts per provider call).
    #[serde(default = "default_batch")]
    pub batch: usize,
    #[serde(default = "default_prompt_lang")]
    pub prompt_lang: String,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            batch: default_batch(),
            prompt_lang: default_prompt_lang(),
        }
    }
}

fn default_device() -> String {
    "cpu".to_string()
}
fn default_batch() -> usize {
    32
}
fn default_prompt_lang() -> String {
    crate::prompts::DEFAULT_PROMPT_KEY.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Only meaningful for backends that load model code; passed through as-is.
    #[serde(default = "default_true")]
    pub trust_remote_code: bool,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_name: None,
            url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_tokens: default_max_tokens(),
            trust_remote_code: true,
            stop: Vec::new(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    20
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrieverConfig {
    #[serde(default = "default_chain_type")]
    pub chain_type: String,
    #[serde(default = "default_top_k_chunks")]
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            chain_type: default_chain_type(),
            top_k: default_top_k_chunks(),
        }
    }
}

fn default_chain_type() -> String {
    "refine".to_string()
}
fn default_top_k_chunks() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_engine")]
    pub engine: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_ocr_binary")]
    pub binary: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: default_ocr_engine(),
            language: default_ocr_language(),
            binary: default_ocr_binary(),
        }
    }
}

fn default_ocr_engine() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_binary() -> PathBuf {
    PathBuf::from("tesseract")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    let library = &config.library;
    if library.chunk_size == 0 {
        bail!("library.chunk_size must be > 0");
    }
    if library.chunk_overlap >= library.chunk_size {
        bail!(
            "library.chunk_overlap ({}) must be smaller than library.chunk_size ({})",
            library.chunk_overlap,
            library.chunk_size
        );
    }
    if let Some(patterns) = &library.header_patterns {
        for pattern in patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("invalid library.header_patterns entry: {}", pattern))?;
        }
    }

    if config.infer.batch == 0 {
        bail!("infer.batch must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model_name.is_none() {
            bail!(
                "embedding.model_name must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.llm.provider != "disabled" && config.llm.model_name.is_none() {
        bail!(
            "llm.model_name must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    if config.retriever.chain_type != "refine" {
        bail!(
            "retriever.chain_type '{}' is not supported; only 'refine' is available",
            config.retriever.chain_type
        );
    }
    if config.retriever.top_k == 0 {
        bail!("retriever.top_k must be >= 1");
    }

    match config.ocr.engine.as_str() {
        "disabled" | "tesseract" => {}
        other => bail!(
            "Unknown ocr engine: '{}'. Must be disabled or tesseract.",
            other
        ),
    }

    Ok(())
}
