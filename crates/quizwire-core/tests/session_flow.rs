//! Cross-component session flow: registry, bridge, and store together,
//! orchestrated the way a connection handler drives them.

use std::sync::Arc;

use quizwire_core::event::SessionEvent;
use quizwire_core::registry::SessionRegistry;
use quizwire_core::store::{MemoryStore, QuizDoc, QuizStatus, ScoreRecord};
use quizwire_core::StateBridge;
use tokio::sync::broadcast;

async fn seeded() -> (SessionRegistry, StateBridge, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_quiz(QuizDoc {
            id: "q-math".to_string(),
            name: "Math101".to_string(),
            duration_secs: 300,
            status: QuizStatus::Approved,
            reveal: false,
        })
        .await;
    for (user_id, score) in [("u1", 10), ("u2", 20), ("u3", 30)] {
        store
            .insert_score(ScoreRecord {
                quiz_id: "q-math".to_string(),
                user_id: user_id.to_string(),
                score,
            })
            .await;
    }
    let bridge = StateBridge::new(store.clone() as Arc<dyn quizwire_core::QuizStore>);
    (SessionRegistry::new(), bridge, store)
}

/// Drain a receiver the way a connection's relay does: events the
/// connection originated itself are dropped at the delivery edge.
fn drain_filtered(
    rx: &mut broadcast::Receiver<Arc<SessionEvent>>,
    connection_id: &str,
) -> Vec<Arc<SessionEvent>> {
    let mut delivered = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.originated_by(connection_id) {
            continue;
        }
        delivered.push(event);
    }
    delivered
}

#[tokio::test]
async fn reveal_change_reaches_peers_but_not_sender() {
    let (registry, bridge, _store) = seeded().await;

    // A and B both join Math101
    let quiz = bridge.find_quiz("Math101").await.unwrap().unwrap();
    let mut rx_a = registry.join("conn-a", &quiz).unwrap();
    let mut rx_b = registry.join("conn-b", &quiz).unwrap();

    // A sets the reveal flag
    let event = SessionEvent::new(&quiz.name, true).with_source("conn-a");
    registry.broadcast(&quiz.name, event);
    bridge.persist_reveal(&quiz.name, true).await.unwrap();

    // B observes the change, A does not observe its own
    let seen_b = drain_filtered(&mut rx_b, "conn-b");
    assert_eq!(seen_b.len(), 1);
    assert!(seen_b[0].value);

    let seen_a = drain_filtered(&mut rx_a, "conn-a");
    assert!(seen_a.is_empty());

    // The stored document now reflects the flag
    let quiz = bridge.find_quiz("Math101").await.unwrap().unwrap();
    assert!(quiz.reveal);
}

#[tokio::test]
async fn join_miss_creates_no_group() {
    let (registry, bridge, _store) = seeded().await;

    // The handler would emit quizNotFound here; either way no membership
    // may exist afterwards.
    let missing = bridge.find_quiz("NoSuchQuiz").await.unwrap();
    assert!(missing.is_none());

    assert!(!registry.session_exists("NoSuchQuiz"));
    assert_eq!(registry.stats().session_count, 0);
    assert_eq!(registry.stats().connection_count, 0);
}

#[tokio::test]
async fn score_list_is_reproducible() {
    let (registry, bridge, _store) = seeded().await;

    let quiz = bridge.find_quiz("Math101").await.unwrap().unwrap();
    let _rx = registry.join("conn-a", &quiz).unwrap();
    let membership = registry.membership("conn-a").unwrap();

    let lines = bridge.score_lines(&membership.quiz_id).await.unwrap();
    assert_eq!(lines, vec!["u1: 10", "u2: 20", "u3: 30"]);

    // Asking again yields the same sequence
    let again = bridge.score_lines(&membership.quiz_id).await.unwrap();
    assert_eq!(lines, again);
}

#[tokio::test]
async fn disconnect_mid_session_leaves_peers_intact() {
    let (registry, bridge, _store) = seeded().await;

    let quiz = bridge.find_quiz("Math101").await.unwrap().unwrap();
    let _rx_a = registry.join("conn-a", &quiz).unwrap();
    let mut rx_b = registry.join("conn-b", &quiz).unwrap();

    // A disconnects; leave is unconditional and idempotent
    registry.leave("conn-a");
    registry.leave("conn-a");

    assert!(registry.session_exists("Math101"));
    assert_eq!(registry.member_count("Math101"), 1);

    // B still receives broadcasts
    let event = SessionEvent::new(&quiz.name, false).with_source("conn-c");
    registry.broadcast(&quiz.name, event);
    assert_eq!(drain_filtered(&mut rx_b, "conn-b").len(), 1);
}
