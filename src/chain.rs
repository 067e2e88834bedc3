//! Conversational retrieval with a refine loop.
//!
//! One call to [`ConversationalChain::answer`]:
//!
//! 1. Rewrites the question into a standalone one using the history (skipped,
//!    with no model call, when the history is empty).
//! 2. Retrieves ranked chunks for the standalone question.
//! 3. Folds over the chunks in rank order, asking the model to refine the
//!    running answer with each chunk. The running answer starts empty; with no
//!    chunks the answer is empty.
//! 4. Appends the original question and the answer to the history.
//!
//! Model and retriever errors propagate unchanged; nothing is retried here.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::history::ChatHistory;
use crate::llm::LanguageModel;
use crate::models::RetrievedChunk;
use crate::prompts::{self, render, PromptTemplate};
use crate::retriever::Retriever;

pub struct ConversationalChain {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
    templates: PromptTemplate,
}

impl ConversationalChain {
    /// Picks the templates for `prompt_lang` once, warning and using the
    /// default pair if the key is unknown.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        prompt_lang: &str,
    ) -> Self {
        let (templates, fell_back) = prompts::select(prompt_lang);
        if fell_back {
            warn!(
                requested = prompt_lang,
                using = templates.key,
                "unknown prompt language, falling back to default templates"
            );
        }
        Self::with_templates(llm, retriever, templates)
    }

    pub fn with_templates(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        templates: PromptTemplate,
    ) -> Self {
        Self {
            llm,
            retriever,
            templates,
        }
    }

    pub fn templates(&self) -> &PromptTemplate {
        &self.templates
    }

    /// Answers `question` in the context of `history` and returns the answer
    /// with the updated history.
    pub async fn answer(
        &self,
        question: &str,
        mut history: ChatHistory,
    ) -> Result<(String, ChatHistory)> {
        let standalone = self.standalone_question(question, &history).await?;
        let chunks = self.retriever.retrieve(&standalone).await?;
        debug!(standalone = %standalone, retrieved = chunks.len(), "retrieved chunks");

        let answer = self.refine(&standalone, &chunks).await?;
        history.push(question, answer.clone());
        Ok((answer, history))
    }

    /// The question rewritten to stand without the history.
    pub async fn standalone_question(
        &self,
        question: &str,
        history: &ChatHistory,
    ) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }
        let transcript = history.to_transcript();
        let prompt = render(
            self.templates.question_rewrite,
            &[("conversation_context", &transcript), ("question", question)],
        );
        let rewritten = self.llm.generate(&prompt).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Ok(question.to_string());
        }
        Ok(rewritten.to_string())
    }

    /// Sequentially refines an answer over `chunks`, one model call per chunk.
    pub async fn refine(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<String> {
        let mut answer = String::new();
        for (step, retrieved) in chunks.iter().enumerate() {
            let prompt = render(
                self.templates.refine,
                &[
                    ("existing_answer", &answer),
                    ("context", &retrieved.chunk.text),
                    ("question", question),
                ],
            );
            answer = self.llm.generate(&prompt).await?.trim().to_string();
            debug!(step, source = %retrieved.chunk.source_id, "refined answer");
        }
        Ok(answer)
    }
}
