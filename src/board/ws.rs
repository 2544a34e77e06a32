use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use newsboard_common::{Column, ItemKey, Notice};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use super::api::SharedState;
use super::projection::BoardView;
use super::store::{BoardEvent, BoardStore};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    BoardReloaded {
        board: BoardView,
    },
    ItemMoved {
        key: ItemKey,
        from_column: Column,
        to_column: Column,
    },
    ItemRolledBack {
        key: ItemKey,
        column: Column,
    },
    ItemPromoted {
        candidate_id: String,
        production_id: String,
    },
    ItemDeleted {
        key: ItemKey,
    },
    Notice {
        notice: Notice,
    },
}

impl WsMessage {
    /// Translate a store event. Reloads carry the whole board so clients
    /// can replace their view wholesale.
    pub async fn from_event(event: BoardEvent, store: &BoardStore) -> Self {
        match event {
            BoardEvent::Reloaded => WsMessage::BoardReloaded {
                board: store.board().await,
            },
            BoardEvent::ItemMoved { key, from, to } => WsMessage::ItemMoved {
                key,
                from_column: from,
                to_column: to,
            },
            BoardEvent::RolledBack { key, to } => WsMessage::ItemRolledBack { key, column: to },
            BoardEvent::ItemPromoted {
                candidate_id,
                production_id,
            } => WsMessage::ItemPromoted {
                candidate_id,
                production_id,
            },
            BoardEvent::ItemDeleted { key } => WsMessage::ItemDeleted { key },
        }
    }
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (sender, receiver) = socket.split();
    let rx = state.ws_tx.subscribe();
    debug!("WebSocket client connected");
    run_socket_loop(sender, receiver, rx).await;
    debug!("WebSocket client disconnected");
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Forwards broadcast messages, watches client frames, and pings every
/// [`PING_INTERVAL`]. If no Pong arrives within [`PONG_TIMEOUT`] the
/// connection is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helpers ────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to all connected WebSocket clients.
/// Returns silently even if no clients are connected.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => error!("Failed to serialize WsMessage: {}", e),
    }
}

/// Pump store events and notices into the WebSocket broadcast channel.
/// Runs until aborted.
pub fn spawn_forwarder(store: BoardStore, tx: broadcast::Sender<String>) -> JoinHandle<()> {
    let mut events = store.subscribe_events();
    let mut notices = store.subscribe_notices();
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => WsMessage::from_event(event, &store).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                notice = notices.recv() => match notice {
                    Ok(notice) => WsMessage::Notice { notice },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            broadcast_message(&tx, &msg);
        }
    })
}

// ── Tests ────────────────────────────────────────────────────────────
