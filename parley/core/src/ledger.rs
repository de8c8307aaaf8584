//! Conversation Ledger
//!
//! Append-only record of the conversational turns in a session, bounded to
//! the most recent N turns. Only fallback exchanges land here; command
//! replies are transient actions and are never recorded.
//!
//! # Design Philosophy
//!
//! The ledger is session bookkeeping: it feeds shutdown statistics and the
//! persisted transcript. Responders do not read it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of turns retained
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the shell
    User,
    /// The shell's reply
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One recorded `(role, content)` pair
///
/// Turns are immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Create a turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Who produced this turn
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Turn text
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Bounded FIFO log of turns
#[derive(Clone, Debug)]
pub struct ConversationLedger {
    turns: VecDeque<Turn>,
    limit: usize,
    /// Total appends over the ledger's lifetime, including evicted turns
    total_appended: u64,
}

impl Default for ConversationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationLedger {
    /// Create a ledger that retains at most `limit` turns
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            turns: VecDeque::with_capacity(limit),
            limit,
            total_appended: 0,
        }
    }

    /// Append a turn, evicting the oldest when over the limit
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn::new(role, content));
        self.total_appended += 1;

        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }

        tracing::trace!(
            role = %role,
            retained = self.turns.len(),
            "Turn appended"
        );
    }

    /// Append a user utterance followed by the assistant's reply
    pub fn record_exchange(&mut self, utterance: impl Into<String>, reply: impl Into<String>) {
        self.append(Role::User, utterance);
        self.append(Role::Assistant, reply);
    }

    /// Owned copy of the retained turns, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// The last `count` turns, oldest first
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<Turn> {
        let start = self.turns.len().saturating_sub(count);
        self.turns.iter().skip(start).cloned().collect()
    }

    /// Drop every retained turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of retained turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of retained turns
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Appends over the ledger's lifetime, evicted turns included
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}
