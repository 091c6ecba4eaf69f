//! Store abstraction for quiz documents and score records.
//!
//! The document store is an external collaborator: this layer reads quiz
//! documents, overwrites the reveal flag, and lists score records, nothing
//! more. The trait keeps backends pluggable; `MemoryStore` backs the server
//! process and the test suites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Store errors. Backend failures are logged and swallowed at the
/// connection-actor boundary; they never tear down a connection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Review lifecycle state of a quiz document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Pending,
    Approved,
    Rejected,
}

/// A quiz document as stored externally.
///
/// Only `id`, `name`, and `reveal` are touched by the session layer;
/// `duration_secs` and `status` ride along so documents round-trip whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDoc {
    /// Store-assigned identifier.
    pub id: String,
    /// Human-chosen name, globally unique.
    pub name: String,
    /// Quiz duration in seconds.
    pub duration_secs: u64,
    /// Review status.
    pub status: QuizStatus,
    /// Reveal flag: whether results are shown to viewers.
    #[serde(default)]
    pub reveal: bool,
}

/// A participant's persisted result for one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Quiz the score belongs to.
    pub quiz_id: String,
    /// Participant identifier.
    pub user_id: String,
    /// Numeric result.
    pub score: i64,
}

/// The store operations the session layer consumes.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Look up a quiz document by its unique name.
    async fn find_quiz_by_name(&self, name: &str) -> Result<Option<QuizDoc>, StoreError>;

    /// Overwrite the reveal flag on the quiz named `name`.
    ///
    /// Returns `false` when no document matched. Last write wins; there is
    /// no optimistic concurrency on the flag.
    async fn set_reveal(&self, name: &str, value: bool) -> Result<bool, StoreError>;

    /// List all score records for a quiz, in the backend's natural order.
    async fn list_scores(&self, quiz_id: &str) -> Result<Vec<ScoreRecord>, StoreError>;
}

/// Seed documents loaded into a [`MemoryStore`] at startup.
#[derive(Debug, Default, Deserialize)]
pub struct StoreSeed {
    /// Quiz documents.
    #[serde(default)]
    pub quizzes: Vec<QuizDoc>,
    /// Score records.
    #[serde(default)]
    pub scores: Vec<ScoreRecord>,
}

/// In-memory store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Quiz documents keyed by name.
    quizzes: RwLock<HashMap<String, QuizDoc>>,
    /// Score records in insertion order.
    scores: RwLock<Vec<ScoreRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from seed documents.
    #[must_use]
    pub fn from_seed(seed: StoreSeed) -> Self {
        let quizzes = seed
            .quizzes
            .into_iter()
            .map(|q| (q.name.clone(), q))
            .collect();
        Self {
            quizzes: RwLock::new(quizzes),
            scores: RwLock::new(seed.scores),
        }
    }

    /// Insert or replace a quiz document.
    pub async fn insert_quiz(&self, quiz: QuizDoc) {
        self.quizzes.write().await.insert(quiz.name.clone(), quiz);
    }

    /// Append a score record.
    pub async fn insert_score(&self, score: ScoreRecord) {
        self.scores.write().await.push(score);
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn find_quiz_by_name(&self, name: &str) -> Result<Option<QuizDoc>, StoreError> {
        Ok(self.quizzes.read().await.get(name).cloned())
    }

    async fn set_reveal(&self, name: &str, value: bool) -> Result<bool, StoreError> {
        let mut quizzes = self.quizzes.write().await;
        match quizzes.get_mut(name) {
            Some(quiz) => {
                quiz.reveal = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_scores(&self, quiz_id: &str) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self
            .scores
            .read()
            .await
            .iter()
            .filter(|s| s.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math_quiz() -> QuizDoc {
        QuizDoc {
            id: "q-1".to_string(),
            name: "Math101".to_string(),
            duration_secs: 300,
            status: QuizStatus::Approved,
            reveal: false,
        }
    }

    #[tokio::test]
    async fn test_find_quiz_by_name() {
        let store = MemoryStore::new();
        store.insert_quiz(math_quiz()).await;

        let found = store.find_quiz_by_name("Math101").await.unwrap();
        assert_eq!(found.unwrap().id, "q-1");

        assert!(store.find_quiz_by_name("NoSuchQuiz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_reveal() {
        let store = MemoryStore::new();
        store.insert_quiz(math_quiz()).await;

        assert!(store.set_reveal("Math101", true).await.unwrap());
        let quiz = store.find_quiz_by_name("Math101").await.unwrap().unwrap();
        assert!(quiz.reveal);

        // Missing quiz: a no-op, not an error
        assert!(!store.set_reveal("NoSuchQuiz", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_scores_filters_by_quiz() {
        let store = MemoryStore::new();
        store
            .insert_score(ScoreRecord {
                quiz_id: "q-1".into(),
                user_id: "u1".into(),
                score: 10,
            })
            .await;
        store
            .insert_score(ScoreRecord {
                quiz_id: "q-2".into(),
                user_id: "u2".into(),
                score: 20,
            })
            .await;

        let scores = store.list_scores("q-1").await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].user_id, "u1");

        assert!(store.list_scores("q-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_seed() {
        let seed = StoreSeed {
            quizzes: vec![math_quiz()],
            scores: vec![ScoreRecord {
                quiz_id: "q-1".into(),
                user_id: "u1".into(),
                score: 10,
            }],
        };

        let store = MemoryStore::from_seed(seed);
        assert!(store.find_quiz_by_name("Math101").await.unwrap().is_some());
        assert_eq!(store.list_scores("q-1").await.unwrap().len(), 1);
    }
}
