//! Session registry for Quizwire.
//!
//! The registry owns the quiz-name → session map and the connection →
//! membership map. It is an explicitly owned object shared behind `Arc`
//! and passed to connection handlers; membership is never ambient global
//! state. Sharded maps keep joins and leaves from different connections
//! atomic with respect to each other.

use crate::event::SessionEvent;
use crate::session::{validate_quiz_name, Session};
use crate::store::QuizDoc;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid quiz name.
    #[error("Invalid quiz name: {0}")]
    InvalidQuizName(&'static str),

    /// Maximum live session count reached.
    #[error("Maximum live session count reached")]
    MaxSessionsReached,
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of live sessions.
    pub max_sessions: usize,
    /// Fan-out channel capacity per session.
    pub session_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            session_capacity: 256,
        }
    }
}

/// A connection's current enrollment.
///
/// A connection is a member of at most one session at a time; joining a
/// different quiz replaces this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Store-assigned quiz identifier.
    pub quiz_id: String,
    /// Quiz name, the session key.
    pub quiz_name: String,
}

/// The session registry.
///
/// Sessions exist implicitly: created on first join, removed when the last
/// member leaves. There is no explicit create/destroy operation.
pub struct SessionRegistry {
    /// Live sessions indexed by quiz name.
    sessions: DashMap<String, Session>,
    /// Memberships indexed by connection ID.
    memberships: DashMap<String, Membership>,
    /// Configuration.
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating session registry with config: {:?}", config);
        Self {
            sessions: DashMap::new(),
            memberships: DashMap::new(),
            config,
        }
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            session_count: self.sessions.len(),
            connection_count: self.memberships.len(),
            member_total: self.sessions.iter().map(|s| s.member_count()).sum(),
        }
    }

    /// Enroll a connection in the session for `quiz`.
    ///
    /// The quiz document has already been resolved against the store by the
    /// caller; a missing quiz never reaches this method. If the connection
    /// is currently a member of a different session it is migrated out of
    /// that group first.
    ///
    /// Returns a receiver for events relayed through the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the quiz name is invalid or the session limit is
    /// reached.
    pub fn join(
        &self,
        connection_id: &str,
        quiz: &QuizDoc,
    ) -> Result<broadcast::Receiver<Arc<SessionEvent>>, RegistryError> {
        validate_quiz_name(&quiz.name).map_err(RegistryError::InvalidQuizName)?;

        // Single-membership invariant: joining a new quiz leaves the old one.
        let previous = self
            .memberships
            .get(connection_id)
            .map(|m| m.quiz_name.clone());
        if let Some(prev_name) = previous {
            if prev_name != quiz.name {
                debug!(
                    connection = %connection_id,
                    from = %prev_name,
                    to = %quiz.name,
                    "Migrating connection to new session"
                );
            }
            self.leave(connection_id);
        }

        if !self.sessions.contains_key(&quiz.name) && self.sessions.len() >= self.config.max_sessions
        {
            return Err(RegistryError::MaxSessionsReached);
        }

        let mut entry = self.sessions.entry(quiz.name.clone()).or_insert_with(|| {
            debug!(quiz = %quiz.name, "Creating session");
            Session::with_capacity(&quiz.id, &quiz.name, self.config.session_capacity)
        });

        let receiver = entry.join(connection_id);
        let member_count = entry.member_count();
        drop(entry);

        self.memberships.insert(
            connection_id.to_string(),
            Membership {
                quiz_id: quiz.id.clone(),
                quiz_name: quiz.name.clone(),
            },
        );

        debug!(
            quiz = %quiz.name,
            connection = %connection_id,
            members = member_count,
            "Joined"
        );

        Ok(receiver)
    }

    /// Remove a connection from whatever session it belongs to.
    ///
    /// Idempotent: safe to call on a connection with no membership. An
    /// emptied session is dropped from the registry.
    ///
    /// Returns the membership that was removed, if any.
    pub fn leave(&self, connection_id: &str) -> Option<Membership> {
        let (_, membership) = self.memberships.remove(connection_id)?;

        if let Some(mut session) = self.sessions.get_mut(&membership.quiz_name) {
            session.leave(connection_id);

            debug!(
                quiz = %membership.quiz_name,
                connection = %connection_id,
                members = session.member_count(),
                "Left"
            );

            if session.is_empty() {
                drop(session); // Release the lock
                self.sessions.remove(&membership.quiz_name);
                debug!(quiz = %membership.quiz_name, "Dropped empty session");
            }
        }

        Some(membership)
    }

    /// Get a connection's current membership.
    #[must_use]
    pub fn membership(&self, connection_id: &str) -> Option<Membership> {
        self.memberships.get(connection_id).map(|m| m.clone())
    }

    /// Relay an event to the session for `quiz_name`.
    ///
    /// Returns the number of receivers reached. The originating connection
    /// receives the event too and drops it at the delivery edge by matching
    /// `event.source` against its own ID.
    pub fn broadcast(&self, quiz_name: &str, event: SessionEvent) -> usize {
        if let Some(session) = self.sessions.get(quiz_name) {
            let count = session.relay(event);
            trace!(quiz = %quiz_name, recipients = count, "Broadcast session event");
            count
        } else {
            warn!(quiz = %quiz_name, "Broadcast to quiz with no live session");
            0
        }
    }

    /// Check if a quiz currently has a live session.
    #[must_use]
    pub fn session_exists(&self, quiz_name: &str) -> bool {
        self.sessions.contains_key(quiz_name)
    }

    /// Get the member count for a quiz's session.
    #[must_use]
    pub fn member_count(&self, quiz_name: &str) -> usize {
        self.sessions
            .get(quiz_name)
            .map(|s| s.member_count())
            .unwrap_or(0)
    }

    /// Get all live session names.
    #[must_use]
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Number of live sessions.
    pub session_count: usize,
    /// Number of enrolled connections.
    pub connection_count: usize,
    /// Total members across all sessions.
    pub member_total: usize,
}
