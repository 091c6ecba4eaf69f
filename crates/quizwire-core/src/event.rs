//! Internal events relayed through quiz sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique event identifier.
pub type EventId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique event ID.
#[must_use]
pub fn generate_event_id() -> EventId {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// A reveal-flag change fanned out to every member of a quiz group.
///
/// The `source` connection is excluded at the delivery edge: each
/// connection's relay drops events it originated itself.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Originating connection ID, if client-originated.
    pub source: Option<String>,
    /// Quiz name the event belongs to.
    pub quiz: String,
    /// New reveal state.
    pub value: bool,
    /// Timestamp when the event was created.
    pub timestamp: u64,
}

impl SessionEvent {
    /// Create a new session event.
    #[must_use]
    pub fn new(quiz: impl Into<String>, value: bool) -> Self {
        Self {
            id: generate_event_id(),
            source: None,
            quiz: quiz.into(),
            value,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
        }
    }

    /// Attach the originating connection.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether this event originated from the given connection.
    #[must_use]
    pub fn originated_by(&self, connection_id: &str) -> bool {
        self.source.as_deref() == Some(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = SessionEvent::new("Math101", true);
        assert_eq!(event.quiz, "Math101");
        assert!(event.value);
        assert!(event.source.is_none());
    }

    #[test]
    fn test_event_source() {
        let event = SessionEvent::new("Math101", false).with_source("conn-1");
        assert!(event.originated_by("conn-1"));
        assert!(!event.originated_by("conn-2"));
    }

    #[test]
    fn test_unique_event_ids() {
        let id1 = generate_event_id();
        let id2 = generate_event_id();
        assert_ne!(id1, id2);
    }
}
