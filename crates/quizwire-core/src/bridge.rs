//! State bridge between accepted real-time events and the external store.
//!
//! The bridge is the only path from the session layer to persistence:
//! quiz lookup on join, reveal-flag writes, and score-list reads. Results
//! stay typed here; the decision to swallow a failure belongs to the
//! connection actor.

use crate::store::{QuizDoc, QuizStore, ScoreRecord, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Bridges session events to store reads and writes.
#[derive(Clone)]
pub struct StateBridge {
    store: Arc<dyn QuizStore>,
}

impl StateBridge {
    /// Create a bridge over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// Resolve a quiz name to its document, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub async fn find_quiz(&self, name: &str) -> Result<Option<QuizDoc>, StoreError> {
        self.store.find_quiz_by_name(name).await
    }

    /// Persist a reveal-flag change on the quiz named `name`.
    ///
    /// Returns `false` when no document matched; that is a no-op, not an
    /// error. Broadcast and persistence are independent effects; the caller
    /// never rolls one back because the other failed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub async fn persist_reveal(&self, name: &str, value: bool) -> Result<bool, StoreError> {
        let matched = self.store.set_reveal(name, value).await?;
        debug!(quiz = %name, value, matched, "Persisted reveal flag");
        Ok(matched)
    }

    /// Fetch the score lines for a quiz, formatted for display.
    ///
    /// Records are ordered by `user_id` so the sequence is deterministic
    /// regardless of the backend's retrieval order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub async fn score_lines(&self, quiz_id: &str) -> Result<Vec<String>, StoreError> {
        let mut records = self.store.list_scores(quiz_id).await?;
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records.iter().map(format_score_line).collect())
    }
}

/// Format one score record as its display line.
fn format_score_line(record: &ScoreRecord) -> String {
    format!("{}: {}", record.user_id, record.score)
}
