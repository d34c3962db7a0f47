//! # Terminal WebSocket Endpoint
//!
//! Kitchen displays and cashier screens connect here and receive every order
//! event for their store as JSON text frames.
//!
//! ```text
//! GET /ws/terminals?store_id=<uuid>&kind=KITCHEN|CASHIER
//!        │
//!        ▼ upgrade
//!   hub.register(kind, store_id) ──► Registration { id, rx }
//!        │
//!        ├── rx.recv() ─ Some(frame) ──► Message::Text(frame)
//!        │             └ None (hub dropped us for falling behind) ──► close
//!        ├── client Close / error / EOF ──► stop
//!        └── ping every 30 s
//!        │
//!        ▼
//!   hub.unregister(id)
//! ```
//!
//! The endpoint is push-only. Text sent by the client is ignored.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::AppState;
use orderline_core::TerminalKind;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Largest frame accepted from a terminal. They only send control frames.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Query string of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct TerminalParams {
    /// Only events for this store are delivered. All stores when absent.
    pub store_id: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: TerminalKind,
}

fn default_kind() -> TerminalKind {
    TerminalKind::Kitchen
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/terminals", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.db.health_check().await {
        "OK"
    } else {
        "DEGRADED"
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TerminalParams>,
) -> impl IntoResponse {
    debug!(kind = ?params.kind, store_id = ?params.store_id, "Terminal upgrade requested");
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: TerminalParams) {
    let (mut sender, mut receiver) = socket.split();
    let mut registration = state.hub.register(params.kind, params.store_id).await;
    let terminal_id = registration.id.clone();

    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            frame = registration.rx.recv() => {
                let Some(frame) = frame else {
                    warn!(terminal_id = %terminal_id, "Outbound queue closed, disconnecting terminal");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(terminal_id = %terminal_id, "Terminal disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(terminal_id = %terminal_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.unregister(&terminal_id).await;
}
