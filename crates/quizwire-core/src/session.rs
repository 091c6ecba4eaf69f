//! Live quiz sessions.
//!
//! A session is the set of connections currently viewing one quiz, keyed by
//! quiz name. It exists only while at least one connection is a member.

use crate::event::SessionEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Maximum quiz name length accepted on join.
pub const MAX_QUIZ_NAME_LENGTH: usize = 256;

/// Default fan-out channel capacity per session.
const DEFAULT_SESSION_CAPACITY: usize = 256;

/// Validate a quiz name received from a client.
///
/// # Errors
///
/// Returns an error message if the quiz name is invalid.
pub fn validate_quiz_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Quiz name cannot be empty");
    }
    if name.len() > MAX_QUIZ_NAME_LENGTH {
        return Err("Quiz name too long");
    }
    if name.chars().any(|c| c.is_control()) {
        return Err("Quiz name contains control characters");
    }
    Ok(())
}

/// A live quiz group: membership plus the fan-out channel.
#[derive(Debug)]
pub struct Session {
    /// Store-assigned quiz identifier.
    quiz_id: String,
    /// Quiz name, the grouping key.
    name: String,
    /// Fan-out sender for this session.
    sender: broadcast::Sender<Arc<SessionEvent>>,
    /// Set of member connection IDs.
    members: HashSet<String>,
}

impl Session {
    /// Create a new session.
    #[must_use]
    pub fn new(quiz_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_capacity(quiz_id, name, DEFAULT_SESSION_CAPACITY)
    }

    /// Create a new session with a specific fan-out capacity.
    #[must_use]
    pub fn with_capacity(
        quiz_id: impl Into<String>,
        name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            quiz_id: quiz_id.into(),
            name: name.into(),
            sender,
            members: HashSet::new(),
        }
    }

    /// Get the store-assigned quiz ID.
    #[must_use]
    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    /// Get the quiz name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn is_member(&self, connection_id: &str) -> bool {
        self.members.contains(connection_id)
    }

    /// Add a connection to this session.
    ///
    /// Returns a receiver for events relayed through the session.
    pub fn join(&mut self, connection_id: impl Into<String>) -> broadcast::Receiver<Arc<SessionEvent>> {
        let conn_id = connection_id.into();
        self.members.insert(conn_id.clone());
        debug!(quiz = %self.name, connection = %conn_id, "Connection joined session");
        self.sender.subscribe()
    }

    /// Remove a connection from this session.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&mut self, connection_id: &str) -> bool {
        let removed = self.members.remove(connection_id);
        if removed {
            debug!(quiz = %self.name, connection = %connection_id, "Connection left session");
        }
        removed
    }

    /// Relay an event to every receiver in this session.
    ///
    /// Returns the number of receivers the event reached. Delivery is
    /// best-effort; a lagged receiver drops events without blocking others.
    pub fn relay(&self, event: SessionEvent) -> usize {
        trace!(quiz = %self.name, "Relaying session event");
        self.sender.send(Arc::new(event)).unwrap_or_default()
    }

    /// Get all member connection IDs.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    /// Check if the session has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
