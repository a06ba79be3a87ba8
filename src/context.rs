//! Bounded log of recent conversation turns

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of turns retained in the context buffer
pub const CONTEXT_CAPACITY: usize = 5;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance within a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The last [`CONTEXT_CAPACITY`] turns in arrival order.
///
/// Pushing onto a full buffer silently drops the oldest turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBuffer {
    turns: VecDeque<Turn>,
}

impl ContextBuffer {
    pub fn new() -> Self {
        Self {
            turns: VecDeque::with_capacity(CONTEXT_CAPACITY),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        if self.turns.len() == CONTEXT_CAPACITY {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns from oldest to newest
    #[cfg(test)]
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Content of the most recent user turn, if any
    pub fn last_user_utterance(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}
