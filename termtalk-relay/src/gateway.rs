//! Websocket gateway: translates transport events into session operations.
//!
//! Connect issues the challenge, inbound frames are schema-checked into
//! typed variants at the boundary, disconnect releases all per-connection
//! state. Chat frames are relayed only between authenticated connections,
//! and the sender block is stamped from the verified session identity —
//! nothing client-supplied survives into the broadcast.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::AuthErrorKind;
use crate::session::{ConnectionId, SessionManager};
use crate::wire::{ChatMessage, ClientFrame, MessageSender, ServerFrame};

/// Outbound queue depth per connection.
const PEER_QUEUE_DEPTH: usize = 32;

/// Shared relay state: the session manager plus one outbound channel per
/// attached connection.
pub struct RelayState {
    pub sessions: SessionManager,
    peers: DashMap<ConnectionId, mpsc::Sender<ServerFrame>>,
    config: RelayConfig,
}

impl RelayState {
    pub fn new(sessions: SessionManager, config: RelayConfig) -> Self {
        Self {
            sessions,
            peers: DashMap::new(),
            config,
        }
    }

    /// Fan a frame out to every authenticated connection.
    async fn broadcast(&self, frame: ServerFrame) {
        // Snapshot the senders first so no map shard lock is held across
        // an await.
        let targets: Vec<mpsc::Sender<ServerFrame>> = self
            .peers
            .iter()
            .filter(|entry| self.sessions.is_authenticated(*entry.key()))
            .map(|entry| entry.value().clone())
            .collect();

        for tx in targets {
            // A full or closed queue only affects that one receiver.
            let _ = tx.send(frame.clone()).await;
        }
    }
}

/// Build the relay router.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws", get(handle_upgrade))
        .with_state(state)
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection from attach to detach.
async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(PEER_QUEUE_DEPTH);

    let challenge = state.sessions.connect(id, unix_now());
    let hello = ServerFrame::AuthChallenge {
        nonce: challenge.nonce().encoded(),
        expires_at: challenge.expires_at(),
    };
    if send_frame(&mut ws_sender, &hello).await.is_err() {
        state.sessions.disconnect(id);
        return;
    }

    state.peers.insert(id, tx.clone());
    tracing::info!(connection = %id, "connection attached");

    let forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if send_frame(&mut ws_sender, &frame).await.is_err() {
                break;
            }
        }
    });

    // An unauthenticated connection gets the challenge window to finish
    // its handshake before it is dropped.
    let auth_deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.config.challenge_ttl_seconds.max(0) as u64);

    loop {
        let next = if state.sessions.is_authenticated(id) {
            ws_receiver.next().await
        } else {
            match tokio::time::timeout_at(auth_deadline, ws_receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!(connection = %id, "authentication deadline passed");
                    break;
                }
            }
        };

        let Some(Ok(message)) = next else { break };
        match message {
            Message::Text(text) => handle_frame(&state, id, &tx, &text).await,
            Message::Close(_) => break,
            // Pings are answered by the websocket layer; binary frames are
            // not part of the protocol.
            _ => {}
        }
    }

    state.peers.remove(&id);
    state.sessions.disconnect(id);
    forward.abort();
    tracing::info!(connection = %id, "connection detached");
}

/// Dispatch one inbound text frame.
async fn handle_frame(
    state: &RelayState,
    id: ConnectionId,
    tx: &mpsc::Sender<ServerFrame>,
    text: &str,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(connection = %id, error = %err, "malformed frame");
            let _ = tx
                .send(ServerFrame::AuthError {
                    kind: AuthErrorKind::InvalidRequest,
                    message: "malformed frame".to_string(),
                })
                .await;
            return;
        }
    };

    match frame {
        ClientFrame::AuthVerify(request) => {
            match state.sessions.verify(id, &request, unix_now()).await {
                Ok(session) => {
                    let _ = tx
                        .send(ServerFrame::AuthSuccess {
                            handle: session.handle,
                            fingerprint: session.fingerprint.to_string(),
                        })
                        .await;
                }
                Err(err) => {
                    tracing::debug!(connection = %id, error = ?err, "verification rejected");
                    let _ = tx
                        .send(ServerFrame::AuthError {
                            kind: err.kind(),
                            // Display is wire-safe; detail stays in the log.
                            message: err.to_string(),
                        })
                        .await;
                }
            }
        }
        ClientFrame::Message(message) => {
            let Some(session) = state.sessions.identity_of(id) else {
                let _ = tx
                    .send(ServerFrame::AuthError {
                        kind: AuthErrorKind::InvalidRequest,
                        message: "authentication required".to_string(),
                    })
                    .await;
                return;
            };
            let stamped = ChatMessage {
                sender: MessageSender {
                    handle: session.handle,
                    public_key_fingerprint: session.fingerprint.to_string(),
                },
                ..message
            };
            state.broadcast(ServerFrame::Message(stamped)).await;
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).expect("server frames always serialize");
    sink.send(Message::Text(text)).await
}

/// Current wall-clock time as Unix seconds.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs() as i64
}
