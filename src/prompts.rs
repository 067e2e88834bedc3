//! Built-in prompt templates.
//!
//! Each language key names a pair of templates: one that rewrites a
//! follow-up into a standalone question, and one refine step. Placeholders
//! are a closed set, substituted in a single pass:
//!
//! | Template | Placeholders |
//! |----------|--------------|
//! | question rewrite | `{conversation_context}`, `{question}` |
//! | refine | `{existing_answer}`, `{context}`, `{question}` |

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const DEFAULT_PROMPT_KEY: &str = "bio_qa_zh";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(conversation_context|question|existing_answer|context)\}")
        .expect("Invalid placeholder regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub key: &'static str,
    pub question_rewrite: &'static str,
    pub refine: &'static str,
}

const BIO_QA_ZH: PromptTemplate = PromptTemplate {
    key: "bio_qa_zh",
    question_rewrite: "请根据下面的对话上下文，把用户的最新问题改写为一个可以独立理解的完整问题：
- 如果最新问题与上下文无关，保持原问题不变
- 不要解释改写的依据
- 只输出一个改写后的问题
- 改写后的长度应与原问题接近

对话上下文：
{conversation_context}

最新问题：
{question}

改写后的完整问题：
",
    refine: "参考已有答案和新的文档内容，回答用户问题：
- 已有答案可能与问题无关，无关时请直接依据文档回答
- 只给出一个回答
- 不要原样摘抄已有答案，可以重新组织语言
- 如果无法回答，直接回答不知道
- 不需要额外说明

用户问题：
{question}

已有答案：
{existing_answer}

新文档内容：
{context}
",
};

const BIO_QA_EN: PromptTemplate = PromptTemplate {
    key: "bio_qa_en",
    question_rewrite: "Given the conversation below, rewrite the user's latest question as a complete question that can be understood on its own.
- If the latest question is unrelated to the conversation, keep it unchanged
- Do not explain the rewrite
- Output exactly one question of similar length

Conversation:
{conversation_context}

Latest question:
{question}

Standalone question:
",
    refine: "Answer the user's question using the existing answer and the new document excerpt.
- The existing answer may be unrelated; if so, answer from the document
- Give a single answer and do not copy the existing answer verbatim
- If the answer is unknown, say that you do not know
- No additional commentary

Question:
{question}

Existing answer:
{existing_answer}

New document excerpt:
{context}
",
};

const GENERAL_EN: PromptTemplate = PromptTemplate {
    key: "general_en",
    question_rewrite: "Rephrase the follow-up question so it can be understood without the chat history.

Chat history:
{conversation_context}

Follow-up question: {question}
Standalone question:",
    refine: "The original question is: {question}
We have provided an existing answer: {existing_answer}
We have the opportunity to refine the existing answer (only if needed) with some more context below.
------------
{context}
------------
Given the new context, refine the original answer to better answer the question. If the context isn't useful, return the original answer.
Refined answer:",
};

const BUILTIN: &[PromptTemplate] = &[BIO_QA_ZH, BIO_QA_EN, GENERAL_EN];

/// Looks up a built-in template pair.
pub fn builtin(key: &str) -> Option<PromptTemplate> {
    BUILTIN.iter().copied().find(|t| t.key == key)
}

pub fn builtin_keys() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|t| t.key)
}

/// Templates for `key`, or the default pair when `key` is unknown.
/// The flag is true when the fallback was used.
pub fn select(key: &str) -> (PromptTemplate, bool) {
    match builtin(key) {
        Some(t) => (t, false),
        None => (BIO_QA_ZH, true),
    }
}

/// Substitutes the named placeholders. Values are inserted verbatim, so a
/// value that itself contains `{question}` is not expanded again. Unknown
/// names and missing values leave the placeholder text untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            values
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_uses_the_closed_placeholder_set() {
        for key in builtin_keys() {
            let t = builtin(key).unwrap();
            assert!(t.question_rewrite.contains("{conversation_context}"), "{}", key);
            assert!(t.question_rewrite.contains("{question}"), "{}", key);
            for p in ["{existing_answer}", "{context}", "{question}"] {
                assert!(t.refine.contains(p), "{} missing {}", key, p);
            }
        }
    }

    #[test]
    fn unknown_key_falls_back_to_default() {
        let (t, fell_back) = select("klingon");
        assert!(fell_back);
        assert_eq!(t.key, DEFAULT_PROMPT_KEY);
        let (t, fell_back) = select("bio_qa_en");
        assert!(!fell_back);
        assert_eq!(t.key, "bio_qa_en");
    }

    #[test]
    fn render_is_single_pass() {
        let out = render(
            "Q: {question} / A: {existing_answer} / {unknown}",
            &[("question", "what is {existing_answer}?"), ("existing_answer", "none")],
        );
        assert_eq!(out, "Q: what is {existing_answer}? / A: none / {unknown}");
    }
}
