//! Connection handlers for the Quizwire server.
//!
//! One actor task per WebSocket connection: inbound frames are dispatched
//! here, session events relayed from the registry are forwarded back out,
//! and disconnect tears membership down.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use quizwire_core::{
    registry::RegistryConfig, QuizStore, SessionEvent, SessionRegistry, StateBridge,
};
use quizwire_protocol::{codec, Frame, PROTOCOL_VERSION};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Per-process connection ID sequence.
static CONNECTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Shared server state.
pub struct AppState {
    /// The session registry.
    pub registry: SessionRegistry,
    /// Bridge to the external store.
    pub bridge: StateBridge,
    /// Server configuration.
    pub config: Config,
    /// Live connection count, gated against `limits.max_connections`.
    active_connections: AtomicUsize,
}

impl AppState {
    /// Create new app state over the given store.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn QuizStore>) -> Self {
        let registry_config = RegistryConfig {
            max_sessions: config.limits.max_sessions,
            session_capacity: 256,
        };

        Self {
            registry: SessionRegistry::with_config(registry_config),
            bridge: StateBridge::new(store),
            config,
            active_connections: AtomicUsize::new(0),
        }
    }
}

/// Build the HTTP/WebSocket router.
#[must_use]
pub fn app(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config, store: Arc<dyn QuizStore>) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone(), store));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Quizwire server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = format!("conn_{}", CONNECTION_SEQ.fetch_add(1, Ordering::Relaxed));

    let (mut sender, mut receiver) = socket.split();

    // Gate on the connection limit before doing any work
    let active = state.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
    if active > state.config.limits.max_connections {
        state.active_connections.fetch_sub(1, Ordering::SeqCst);
        warn!(connection = %connection_id, "Connection limit reached, refusing");
        let refused = Frame::error(1013, "Connection limit reached");
        if let Ok(data) = codec::encode(&refused) {
            let _ = sender.send(Message::Binary(data.to_vec())).await;
        }
        return;
    }

    debug!(connection = %connection_id, "WebSocket connected");

    // Send the connected handshake
    let connected = Frame::connected(
        &connection_id,
        PROTOCOL_VERSION,
        state.config.heartbeat.interval_ms as u32,
    );
    if let Ok(data) = codec::encode(&connected) {
        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
            error!(connection = %connection_id, "Failed to send connected frame");
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    }

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Relay task for the current membership (at most one; rejoin replaces it)
    let mut relay_task: Option<tokio::task::JoinHandle<()>> = None;

    // Session events funnel through an mpsc so the select arm stays stable
    // across rejoins
    let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<Arc<SessionEvent>>();

    loop {
        tokio::select! {
            biased;

            // Relayed session events from the joined quiz group
            Some(event) = relay_rx.recv() => {
                // Sender exclusion happens here, at the delivery edge
                if event.originated_by(&connection_id) {
                    continue;
                }
                let frame = Frame::set_reveal(event.value);
                if let Ok(data) = codec::encode(&frame) {
                    metrics::record_message(data.len(), "outbound");
                    if sender.send(Message::Binary(data.to_vec())).await.is_err() {
                        break;
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let start = Instant::now();
                        read_buffer.extend_from_slice(&data);

                        // Decode as many complete frames as the buffer holds
                        loop {
                            match codec::decode_from(&mut read_buffer) {
                                Ok(Some(frame)) => {
                                    metrics::record_message(data.len(), "inbound");

                                    if let Err(e) = handle_frame(
                                        &frame,
                                        &connection_id,
                                        &state,
                                        &mut sender,
                                        &mut relay_task,
                                        &relay_tx,
                                    ).await {
                                        error!(connection = %connection_id, error = %e, "Frame handling error");
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(connection = %connection_id, error = %e, "Malformed frame");
                                    metrics::record_error("protocol");
                                    let _ = send_frame(&mut sender, &Frame::error(1001, e.to_string())).await;
                                    // The buffer cannot be resynced after a bad prefix
                                    read_buffer.clear();
                                    break;
                                }
                            }
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: abort the relay task and leave whatever session we were in.
    // Leave is idempotent; a store call still in flight cannot re-enroll a
    // connection because membership is only written on join.
    if let Some(task) = relay_task {
        task.abort();
    }
    state.registry.leave(&connection_id);
    state.active_connections.fetch_sub(1, Ordering::SeqCst);
    metrics::set_active_sessions(state.registry.stats().session_count);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Handle a decoded frame.
async fn handle_frame(
    frame: &Frame,
    connection_id: &str,
    state: &Arc<AppState>,
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    relay_task: &mut Option<tokio::task::JoinHandle<()>>,
    relay_tx: &mpsc::UnboundedSender<Arc<SessionEvent>>,
) -> Result<()> {
    match frame {
        Frame::JoinQuiz { quiz } => {
            debug!(connection = %connection_id, quiz = %quiz, "Join request");

            match state.bridge.find_quiz(quiz).await {
                Ok(Some(doc)) => {
                    // Rejoin migrates: the old relay task dies with the old
                    // membership
                    if let Some(task) = relay_task.take() {
                        task.abort();
                    }

                    match state.registry.join(connection_id, &doc) {
                        Ok(mut rx) => {
                            let tx = relay_tx.clone();
                            let handle = tokio::spawn(async move {
                                loop {
                                    match rx.recv().await {
                                        Ok(event) => {
                                            if tx.send(event).is_err() {
                                                break; // Receiver dropped
                                            }
                                        }
                                        Err(broadcast::error::RecvError::Closed) => break,
                                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                                    }
                                }
                            });
                            *relay_task = Some(handle);

                            metrics::record_join();
                            metrics::set_active_sessions(state.registry.stats().session_count);
                            // Silent success: enrollment is the only acknowledgment
                        }
                        Err(e) => {
                            warn!(connection = %connection_id, error = %e, "Join failed");
                            send_frame(sender, &Frame::error(1002, e.to_string())).await?;
                        }
                    }
                }
                Ok(None) => {
                    warn!(connection = %connection_id, quiz = %quiz, "Quiz not found");
                    send_frame(sender, &Frame::quiz_not_found(quiz.clone())).await?;
                }
                Err(e) => {
                    // Store failure: logged and swallowed, no client-visible event
                    error!(connection = %connection_id, error = %e, "Store lookup failed");
                    metrics::record_error("store");
                }
            }
        }

        Frame::SetReveal { value } => {
            let Some(membership) = state.registry.membership(connection_id) else {
                // Protocol misuse: no session joined, treat as a no-op
                debug!(connection = %connection_id, "Reveal change with no session, ignoring");
                return Ok(());
            };

            let event =
                SessionEvent::new(&membership.quiz_name, *value).with_source(connection_id);
            let count = state.registry.broadcast(&membership.quiz_name, event);
            metrics::record_reveal_update();
            debug!(
                connection = %connection_id,
                quiz = %membership.quiz_name,
                value,
                recipients = count,
                "Relayed reveal change"
            );

            // Persistence is independent of the relay; neither rolls back
            // on the other's failure
            match state.bridge.persist_reveal(&membership.quiz_name, *value).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(quiz = %membership.quiz_name, "Reveal update matched no quiz document");
                }
                Err(e) => {
                    error!(quiz = %membership.quiz_name, error = %e, "Failed to persist reveal flag");
                    metrics::record_error("store");
                }
            }
        }

        Frame::ScoreRequest => {
            let Some(membership) = state.registry.membership(connection_id) else {
                // No session joined: reply with an empty list, never an error
                debug!(connection = %connection_id, "Score request with no session");
                send_frame(sender, &Frame::score_list(Vec::new())).await?;
                return Ok(());
            };

            match state.bridge.score_lines(&membership.quiz_id).await {
                Ok(scores) => {
                    debug!(
                        connection = %connection_id,
                        quiz = %membership.quiz_name,
                        count = scores.len(),
                        "Score list request"
                    );
                    send_frame(sender, &Frame::score_list(scores)).await?;
                }
                Err(e) => {
                    // Failed-silently: the requester gets no reply
                    error!(quiz = %membership.quiz_name, error = %e, "Failed to list scores");
                    metrics::record_error("store");
                }
            }
        }

        Frame::Ping { timestamp } => {
            send_frame(sender, &Frame::pong(*timestamp)).await?;
        }

        Frame::Pong { .. } => {
            // Keepalive reply, nothing to do
        }

        _ => {
            warn!(connection = %connection_id, kind = ?frame.kind(), "Unexpected frame type");
        }
    }

    Ok(())
}

/// Send a frame to the WebSocket.
async fn send_frame(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<()> {
    let data = codec::encode(frame)?;
    metrics::record_message(data.len(), "outbound");
    sender.send(Message::Binary(data.to_vec())).await?;
    Ok(())
}
