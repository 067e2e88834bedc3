//! Generative language model clients.
//!
//! | Config Value | Model |
//! |-------------|-------|
//! | `"disabled"` | [`DisabledModel`] |
//! | `"ollama"` | [`OllamaModel`] — `POST /api/generate` |
//! | `"openai"` | [`OpenAIChatModel`] — any OpenAI-compatible `/chat/completions` |
//!
//! Every reply goes through [`postprocess`]: a reasoning block closed by
//! `</think>` is dropped and the text is cut at the first configured stop
//! sequence. Generation requests are not retried.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::CapabilityError;
use crate::http::{build_client, post_json};

const THINK_END: &str = "</think>";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Completes `prompt` and returns the post-processed reply.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Strips everything up to the last `</think>` and truncates at the earliest
/// stop sequence.
pub fn postprocess(raw: &str, stop: &[String]) -> String {
    let text = match raw.rfind(THINK_END) {
        Some(i) => &raw[i + THINK_END.len()..],
        None => raw,
    };
    let end = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    text[..end].trim().to_string()
}

// ============ Disabled Model ============

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Language model is disabled. Set [llm] provider in config.")
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

pub struct OllamaModel {
    model: String,
    url: String,
    config: LlmConfig,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model_name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model_name required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            config: config.clone(),
            client: build_client(config.timeout_secs)?,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                num_predict: self.config.max_tokens,
                stop: &self.config.stop,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "ollama generate");
        let json = post_json(
            &self.client,
            "ollama generate",
            &format!("{}/api/generate", self.url),
            None,
            &self.request(prompt),
            0,
        )
        .await?;
        let raw = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| CapabilityError::rejected("ollama generate", "missing response field"))?;
        Ok(postprocess(raw, &self.config.stop))
    }
}

// ============ OpenAI-compatible chat ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat completions client. Sends `OPENAI_API_KEY` as a bearer token when set;
/// self-hosted compatible servers usually need none.
pub struct OpenAIChatModel {
    model: String,
    url: String,
    api_key: Option<String>,
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model_name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model_name required for OpenAI provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            config: config.clone(),
            client: build_client(config.timeout_secs)?,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        // The API accepts at most four stop sequences; the rest are applied locally.
        let stop = &self.config.stop[..self.config.stop.len().min(4)];
        ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            stop,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "chat completion");
        let json = post_json(
            &self.client,
            "chat completions",
            &format!("{}/chat/completions", self.url),
            self.api_key.as_deref(),
            &self.request(prompt),
            0,
        )
        .await?;
        let raw = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                CapabilityError::rejected("chat completions", "missing choices[0].message.content")
            })?;
        Ok(postprocess(raw, &self.config.stop))
    }
}

pub fn create_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledModel)),
        "ollama" => Ok(Box::new(OllamaModel::new(config)?)),
        "openai" => Ok(Box::new(OpenAIChatModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
