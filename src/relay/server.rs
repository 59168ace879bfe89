use super::messages::{PeerRole, RelayMessage};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Connection identifier, unique for the lifetime of the relay process.
pub type ConnId = u64;

struct Peer {
    role: PeerRole,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct RelaySession {
    peers: HashMap<ConnId, Peer>,
}

/// Shared relay state: session id → peer set.
///
/// Sessions are created on first join and deleted when their peer set
/// empties; the map is unbounded and unexpired by design (see DESIGN.md).
#[derive(Clone)]
pub struct RelayState {
    sessions: Arc<RwLock<HashMap<String, RelaySession>>>,
    next_conn_id: Arc<AtomicU64>,
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn allocate_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Add a connection to the named session, creating the session if absent.
    pub async fn join(
        &self,
        session_id: &str,
        conn: ConnId,
        role: PeerRole,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_default();
        session.peers.insert(conn, Peer { role, sender });

        match role {
            PeerRole::Broadcaster => info!(session_id, conn, "broadcaster joined session"),
            PeerRole::Audience => info!(session_id, conn, "audience joined session"),
        }
    }

    /// Forward a raw message to every other member of the session.
    ///
    /// The sender set is snapshotted before delivery so a concurrent
    /// join/leave cannot fault the iteration. Closed connections are
    /// skipped, not removed; their own close event removes them.
    pub async fn broadcast(&self, session_id: &str, from: ConnId, raw: String) -> usize {
        let recipients: Vec<mpsc::UnboundedSender<String>> = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(session) => session
                    .peers
                    .iter()
                    .filter(|(id, _)| **id != from)
                    .map(|(_, peer)| peer.sender.clone())
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for sender in recipients {
            if sender.send(raw.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Remove a connection from its session; an empty peer set deletes the
    /// session entry entirely.
    pub async fn leave(&self, session_id: &str, conn: ConnId) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.peers.remove(&conn);
            if session.peers.is_empty() {
                sessions.remove(session_id);
                info!(session_id, "session emptied, removing");
            }
        }
    }

    /// Peer count for a session, `None` once the session entry is gone.
    pub async fn peer_count(&self, session_id: &str) -> Option<usize> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.peers.len())
    }

    /// Declared role of a connection within a session, if it is a member.
    pub async fn peer_role(&self, session_id: &str, conn: ConnId) -> Option<PeerRole> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .and_then(|s| s.peers.get(&conn))
            .map(|p| p.role)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the relay router: the WebSocket endpoint plus a health check.
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ws_handler(State(state): State<RelayState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_connection(state, socket))
}

async fn handle_connection(state: RelayState, socket: WebSocket) {
    let conn_id = state.allocate_conn_id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let send_task = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The session this connection has joined, if any. Captions sent before a
    // join are dropped.
    let mut current_session: Option<String> = None;

    while let Some(Ok(message)) = ws_receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<RelayMessage>(&text) {
            Ok(RelayMessage::Join { session_id, role }) => {
                if let Some(previous) = current_session.take() {
                    if previous != session_id {
                        state.leave(&previous, conn_id).await;
                    }
                }
                state.join(&session_id, conn_id, role, out_tx.clone()).await;
                current_session = Some(session_id);
            }
            Ok(RelayMessage::Caption { .. }) => {
                if let Some(session_id) = &current_session {
                    let delivered = state.broadcast(session_id, conn_id, text).await;
                    debug!(session_id, conn_id, delivered, "caption relayed");
                }
            }
            Err(e) => {
                warn!(conn_id, error = %e, "unparseable relay message");
            }
        }
    }

    if let Some(session_id) = current_session {
        state.leave(&session_id, conn_id).await;
    }
    send_task.abort();
    debug!(conn_id, "relay connection closed");
}
