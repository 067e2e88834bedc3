//! Bounded conversation history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Turns kept per conversation.
pub const MAX_TURNS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

/// The most recent [`MAX_TURNS`] turns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn, dropping the oldest ones beyond the bound.
    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(ChatTurn {
            question: question.into(),
            answer: answer.into(),
        });
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    /// `Human: …` / `Assistant: …` lines, one pair per turn.
    pub fn to_transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Human: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
