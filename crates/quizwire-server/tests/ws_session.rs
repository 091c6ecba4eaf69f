//! End-to-end session flow over a real WebSocket connection.

use futures_util::{SinkExt, StreamExt};
use quizwire_core::store::{MemoryStore, QuizDoc, QuizStatus, ScoreRecord};
use quizwire_core::QuizStore;
use quizwire_protocol::{codec, Frame};
use quizwire_server::{app, AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_server() -> (SocketAddr, Arc<MemoryStore>, Arc<AppState>) {
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

    let config = Config::default();
    let state = Arc::new(AppState::new(config, store.clone() as Arc<dyn QuizStore>));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, store, state)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    match next_frame(&mut ws).await {
        Frame::Connected { .. } => {}
        other => panic!("expected connected frame, got {other:?}"),
    }
    ws
}

async fn send(ws: &mut WsClient, frame: &Frame) {
    let data = codec::encode(frame).unwrap();
    ws.send(Message::Binary(data.to_vec())).await.unwrap();
}

async fn next_frame(ws: &mut WsClient) -> Frame {
    loop {
        match ws.next().await.expect("connection closed").unwrap() {
            Message::Binary(data) => {
                let mut buf = bytes::BytesMut::from(&data[..]);
                if let Some(frame) = codec::decode_from(&mut buf).unwrap() {
                    return frame;
                }
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected websocket message: {other:?}"),
        }
    }
}

/// `joinQuiz` is silent on success; a ping round-trip guarantees the join
/// has been processed before the test proceeds.
async fn join_and_sync(ws: &mut WsClient, quiz: &str) {
    send(ws, &Frame::join_quiz(quiz)).await;
    send(ws, &Frame::ping()).await;
    match next_frame(ws).await {
        Frame::Pong { .. } => {}
        other => panic!("expected pong after join, got {other:?}"),
    }
}

#[tokio::test]
async fn reveal_change_reaches_peer_not_sender() {
    let (addr, store, _state) = spawn_server().await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    join_and_sync(&mut a, "Math101").await;
    join_and_sync(&mut b, "Math101").await;

    send(&mut a, &Frame::set_reveal(true)).await;

    // B observes the relayed change
    match next_frame(&mut b).await {
        Frame::SetReveal { value } => assert!(value),
        other => panic!("expected relayed Set, got {other:?}"),
    }

    // A never sees its own change: the next frame A receives is the pong
    send(&mut a, &Frame::ping()).await;
    match next_frame(&mut a).await {
        Frame::Pong { .. } => {}
        Frame::SetReveal { .. } => panic!("sender received its own reveal change"),
        other => panic!("expected pong, got {other:?}"),
    }

    // The pong also means the Set handler finished persisting
    let quiz = store.find_quiz_by_name("Math101").await.unwrap().unwrap();
    assert!(quiz.reveal);
}

#[tokio::test]
async fn join_unknown_quiz_reports_not_found() {
    let (addr, _store, state) = spawn_server().await;

    let mut c = connect(addr).await;
    send(&mut c, &Frame::join_quiz("NoSuchQuiz")).await;

    match next_frame(&mut c).await {
        Frame::QuizNotFound { quiz } => assert_eq!(quiz, "NoSuchQuiz"),
        other => panic!("expected quizNotFound, got {other:?}"),
    }

    // No group was created
    let stats = state.registry.stats();
    assert_eq!(stats.session_count, 0);
    assert_eq!(stats.connection_count, 0);
}

#[tokio::test]
async fn score_list_round_trip() {
    let (addr, _store, _state) = spawn_server().await;

    let mut c = connect(addr).await;
    join_and_sync(&mut c, "Math101").await;
    send(&mut c, &Frame::score_request()).await;

    match next_frame(&mut c).await {
        Frame::ScoreList { scores } => {
            assert_eq!(scores, ["u1: 10", "u2: 20", "u3: 30"]);
        }
        other => panic!("expected arraydata, got {other:?}"),
    }
}

#[tokio::test]
async fn score_request_without_join_is_empty() {
    let (addr, _store, _state) = spawn_server().await;

    let mut c = connect(addr).await;
    send(&mut c, &Frame::score_request()).await;

    match next_frame(&mut c).await {
        Frame::ScoreList { scores } => assert!(scores.is_empty()),
        other => panic!("expected empty arraydata, got {other:?}"),
    }
}

#[tokio::test]
async fn reveal_without_join_is_ignored() {
    let (addr, store, _state) = spawn_server().await;

    let mut c = connect(addr).await;
    send(&mut c, &Frame::set_reveal(true)).await;

    // The connection stays usable after the misuse
    send(&mut c, &Frame::ping()).await;
    assert!(matches!(next_frame(&mut c).await, Frame::Pong { .. }));

    // And nothing was persisted
    let quiz = store.find_quiz_by_name("Math101").await.unwrap().unwrap();
    assert!(!quiz.reveal);
}

#[tokio::test]
async fn disconnect_cleans_up_membership() {
    let (addr, _store, state) = spawn_server().await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    join_and_sync(&mut a, "Math101").await;
    join_and_sync(&mut b, "Math101").await;
    assert_eq!(state.registry.member_count("Math101"), 2);

    drop(a);

    // The server notices the closed transport and leaves the session
    let mut waited = 0;
    while state.registry.member_count("Math101") != 1 && waited < 50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        waited += 1;
    }
    assert_eq!(state.registry.member_count("Math101"), 1);

    // The remaining member is unaffected
    send(&mut b, &Frame::ping()).await;
    assert!(matches!(next_frame(&mut b).await, Frame::Pong { .. }));
}
